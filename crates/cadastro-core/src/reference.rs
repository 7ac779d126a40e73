//! Static CAR theme taxonomy: ordered thematic groups, their theme
//! descriptors, and an inverted index from raw `tema` label to descriptor.
//!
//! The model is built once per process (`ReferenceModel::standard`) and is
//! immutable afterwards. Unknown labels are reported as `None`, never as errors.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::types::GeometryKind::{self, Point, Polygon};

/// Suffix appended to a theme label to name its point-marker variant.
pub const MARKER_SUFFIX: &str = " - MARCADOR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThemeDescriptor {
    /// Raw `tema` value as emitted by SICAR.
    pub label: &'static str,
    pub output_name: &'static str,
    /// Advisory; the written data decides the symbolizer.
    pub kind: GeometryKind,
    /// `None` means outline only.
    pub fill: Option<&'static str>,
    pub outline: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThemeGroup {
    pub key: &'static str,
    pub display_name: &'static str,
    pub order: u8,
    pub themes: &'static [ThemeDescriptor],
}

impl ThemeGroup {
    /// `"{order}-{display name}"` with spaces and path-hostile characters
    /// replaced by underscores. `width` zero-pads the order.
    pub fn folder_name(&self, width: usize) -> String {
        let safe: String = self
            .display_name
            .chars()
            .map(|c| match c {
                ' ' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        format!("{:0width$}-{}", self.order, safe, width = width)
    }
}

const fn theme(
    label: &'static str,
    output_name: &'static str,
    kind: GeometryKind,
    fill: Option<&'static str>,
    outline: &'static str,
) -> ThemeDescriptor {
    ThemeDescriptor { label, output_name, kind, fill, outline }
}

static AREA_DO_IMOVEL: [ThemeDescriptor; 3] = [
    theme("Área do Imovel", "Area_do_Imovel", Polygon, None, "#f8cd24"),
    theme("Sede ou Ponto de Referência do Imóvel", "Sede_ou_Ponto_de_Referencia_do_Imovel", Point, Some("#e5bd00"), "#e5bd00"),
    theme("Área Líquida do Imóvel", "Area_Liquida_do_Imovel", Polygon, Some("#868585"), "#e1b816"),
];

static SERVIDAO_ADMINISTRATIVA: [ThemeDescriptor; 4] = [
    theme("Infraestrutura Pública", "Infraestrutura_Publica", Polygon, Some("#844646"), "#844646"),
    theme("Utilidade Pública", "Utilidade_Publica", Polygon, Some("#9e5353"), "#9e5353"),
    theme("Reservatório para Abastecimento ou Geração de Energia", "Reservatorio_Abastecimento_ou_Geracao_Energia", Polygon, Some("#7238ad"), "#7238ad"),
    theme("Entorno de Reservatório para Abastecimento ou Geração de Energia", "Entorno_Reservatorio_Abastecimento_ou_Geracao_Energia", Polygon, Some("#ad389a"), "#ad389a"),
];

static COBERTURA_DO_SOLO: [ThemeDescriptor; 4] = [
    theme("Área Consolidada", "Area_Consolidada", Polygon, Some("#dddddd"), "#dddddd"),
    theme("Remanescente de Vegetação Nativa", "Remanescente_de_Vegetacao_Nativa", Polygon, Some("#4fb370"), "#059a37"),
    theme("Área de Pousio", "Area_de_Pousio", Polygon, Some("#a0c49b"), "#a0c49b"),
    theme("Área não Classificada", "Area_nao_Classificada", Polygon, Some("#e0e0e0"), "#b0b0b0"),
];

static PRESERVACAO_PERMANENTE: [ThemeDescriptor; 45] = [
    theme("Curso d'água natural de até 10 metros", "Curso_dagua_natural_ate_10_metros", Polygon, Some("#a0dcf1"), "#a0dcf1"),
    theme("Curso d'água natural de 10 a 50 metros", "Curso_dagua_natural_10_a_50_metros", Polygon, Some("#7fb8ff"), "#7fb8ff"),
    theme("Curso d'água natural de 50 a 200 metros", "Curso_dagua_natural_50_a_200_metros", Polygon, Some("#9696ff"), "#9696ff"),
    theme("Curso d'água natural de 200 a 600 metros", "Curso_dagua_natural_200_a_600_metros", Polygon, Some("#5656ff"), "#5656ff"),
    theme("Curso d'água natural acima de 600 metros", "Curso_dagua_natural_acima_600_metros", Polygon, Some("#0000ff"), "#0000ff"),
    theme("Lago ou lagoa natural", "Lago_ou_Lagoa_Natural", Polygon, Some("#2892d3"), "#93def5"),
    theme("Nascente ou olho d'água perene", "Nascente_ou_Olho_dagua_Perene", Point, Some("#2892d3"), "#93def5"),
    theme("Reservatório artificial decorrente de barramento ou represamento de cursos d'água naturais", "Reservatorio_Artificial", Polygon, Some("#258ac7"), "#c7cacc"),
    theme("Manguezal", "Manguezal", Polygon, Some("#c4682b"), "#c4682b"),
    theme("Vereda", "Vereda", Polygon, Some("#ff8a3d"), "#ff8a3d"),
    theme("Restinga", "Restinga", Polygon, Some("#c49473"), "#c49473"),
    theme("Área com altitude superior a 1.800 metros", "Area_Altitude_Superior_1800_metros", Polygon, Some("#914d1f"), "#914d1f"),
    theme("Área de declividade maior que 45 graus", "Area_Declividade_Maior_45_graus", Polygon, Some("#c49473"), "#c49473"),
    theme("Borda de chapada", "Borda_Chapada", Polygon, Some("#ffc7a3"), "#ffc7a3"),
    theme("Área de topo de morro", "Area_Topo_Morro", Polygon, Some("#ff9e5e"), "#ff9e5e"),
    theme("Reservatório de geração de energia elétrica construído até 24/08/2001", "Reservatorio_Geracao_Energia_Eletrica_ate_24082001", Polygon, Some("#258ac7"), "#f57337"),
    theme("Banhado", "Banhado", Polygon, Some("#55b7b7"), "#55b7b7"),
    theme("Área de Preservação Permanente em área antropizada não declarada como área consolidada", "APP_em_Area_Antropizada_nao_Declarada_Consolidada", Polygon, Some("#fc2e01"), "#fc2e01"),
    theme("Área de Preservação Permanente em área consolidada", "APP_em_Area_Consolidada", Polygon, Some("#831c00"), "#160804"),
    theme("Área de Preservação Permanente em área de Vegetação Nativa", "APP_em_Vegetacao_Nativa", Polygon, Some("#9000ab"), "#9000ab"),
    theme("Área de Preservação Permanente de Rios até 10 metros", "APP_Rios_ate_10_metros", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Rios de 10 até 50 metros", "APP_Rios_10_ate_50_metros", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Rios de 50 até 200 metros", "APP_Rios_50_ate_200_metros", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Rios de 200 até 600 metros", "APP_Rios_200_ate_600_metros", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Rios com mais de 600 metros", "APP_Rios_mais_600_metros", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Nascentes ou Olhos D'água Perenes", "APP_Nascentes_ou_Olhos_Dagua_Perenes", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Lagos e Lagoas Naturais", "APP_Lagos_e_Lagoas_Naturais", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Reservatório artificial decorrente de barramento de cursos d’água", "APP_Reservatorio_Artificial_Barramento", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Topos de Morro", "APP_Topo_Morro", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Manguezais", "APP_Manguezais", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Áreas com Altitude Superior a 1800 metros", "APP_Altitude_Superior_1800_metros", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Bordas de Chapada", "APP_Borda_Chapada", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Restingas", "APP_Restingas", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Áreas com Declividades Superiores a 45 graus", "APP_Declividade_Maior_45_graus", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Banhado", "APP_Banhado", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de Veredas", "APP_Veredas", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente de geração de energia elétrica construído até 24/08/2001", "APP_Reservatorio_Geracao_Eletrica_ate_24082001", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Preservação Permanente a Recompor de Rios até 10 metros", "APP_a_Recompor_Rios_ate_10_metros", Polygon, Some("#ffd700"), "#ffa500"),
    theme("Área de Preservação Permanente a Recompor de Rios de 10 até 50 metros", "APP_a_Recompor_Rios_10_ate_50_metros", Polygon, Some("#ffd700"), "#ffa500"),
    theme("Área de Preservação Permanente a Recompor de Nascentes ou Olhos D'água Perenes", "APP_a_Recompor_Nascentes_ou_Olhos_Dagua_Perenes", Polygon, Some("#ffd700"), "#ffa500"),
    theme("Área de Preservação Permanente a Recompor de Veredas", "APP_a_Recompor_Veredas", Polygon, Some("#ffd700"), "#ffa500"),
    theme("APP segundo art. 61-A da Lei nº 12.651/2012", "APP_segundo_art_61A_Lei_12651_2012", Polygon, Some("#e6ff00"), "#ccdd00"),
    // Point markers delivered in the MARCADORES layer.
    theme("Área de Preservação Permanente de Nascentes ou Olhos D'água Perenes - MARCADOR", "APP_Nascentes_ou_Olhos_Dagua_Perenes_Marcador", Point, Some("#2892d3"), "#1b5e8c"),
    theme("Área de Preservação Permanente a Recompor de Nascentes ou Olhos D'água Perenes - MARCADOR", "APP_a_Recompor_Nascentes_ou_Olhos_Dagua_Perenes_Marcador", Point, Some("#ffa500"), "#b36b00"),
    theme("Área de Preservação Permanente de Veredas - MARCADOR", "APP_Veredas_Marcador", Point, Some("#ff8a3d"), "#b35a1f"),
];

static RESERVA_LEGAL: [ThemeDescriptor; 4] = [
    theme("Reserva Legal Proposta", "Reserva_Legal_Proposta", Polygon, Some("#289926"), "#50512c"),
    theme("Reserva Legal Averbada", "Reserva_Legal_Averbada", Polygon, Some("#289926"), "#c84905"),
    theme("Reserva Legal Aprovada e não Averbada", "Reserva_Legal_Aprovada_nao_Averbada", Polygon, Some("#289926"), "#61cf0b"),
    theme("Reserva legal vinculada à compensação de outro imóvel", "Reserva_Legal_Vinculada_Compensacao", Polygon, Some("#9ef1b1"), "#e3add6"),
];

static USO_RESTRITO: [ThemeDescriptor; 2] = [
    theme("Área de Uso Restrito para declividade de 25 a 45 graus", "Area_de_Uso_Restrito_Declividade_25_a_45_graus", Polygon, Some("#ffaab1"), "#ffaab1"),
    theme("Área de Uso Restrito para regiões pantaneras", "Area_de_Uso_Restrito_Regioes_Pantaneras", Polygon, Some("#ff606e"), "#ff606e"),
];

static TOTALIZADORES: [ThemeDescriptor; 4] = [
    theme("APP Total", "APP_Total", Polygon, Some("#fffb00"), "#fffb00"),
    theme("Área de Reserva Legal Total", "Area_de_Reserva_Legal_Total", Polygon, Some("#228b22"), "#1a6b1a"),
    theme("Área de Servidão Administrativa Total", "Area_de_Servidao_Administrativa_Total", Polygon, Some("#8e4d7d"), "#8e4d7d"),
    theme("Uso Restrito total", "Uso_Restrito_Total", Polygon, Some("#ff8390"), "#ff8390"),
];

static GROUPS: [ThemeGroup; 7] = [
    ThemeGroup { key: "_Totalizadores", display_name: "Resumo", order: 7, themes: &TOTALIZADORES },
    ThemeGroup { key: "Area_do_Imovel", display_name: "Área do Imóvel", order: 1, themes: &AREA_DO_IMOVEL },
    ThemeGroup { key: "Area_de_Uso_Restrito", display_name: "Área de Uso Restrito", order: 6, themes: &USO_RESTRITO },
    ThemeGroup { key: "Servidao_Administrativa", display_name: "Servidão Administrativa", order: 2, themes: &SERVIDAO_ADMINISTRATIVA },
    ThemeGroup { key: "Cobertura_do_Solo", display_name: "Cobertura do Solo", order: 3, themes: &COBERTURA_DO_SOLO },
    ThemeGroup { key: "Area_de_Preservacao_Permanente", display_name: "Área de Preservação Permanente", order: 4, themes: &PRESERVACAO_PERMANENTE },
    ThemeGroup { key: "Reserva_Legal", display_name: "Reserva Legal", order: 5, themes: &RESERVA_LEGAL },
];

/// One resolved theme: owning group, descriptor and its position in the
/// canonical (group order, theme order) sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeEntry {
    pub group: &'static ThemeGroup,
    pub descriptor: &'static ThemeDescriptor,
    pub rank: usize,
}

impl ThemeEntry {
    pub fn group_key(&self) -> &'static str { self.group.key }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeCounts {
    pub per_group: Vec<(&'static str, usize)>,
    pub total: usize,
}

#[derive(Debug)]
pub struct ReferenceModel {
    groups: Vec<&'static ThemeGroup>,
    index: HashMap<&'static str, ThemeEntry>,
}

impl ReferenceModel {
    /// The process-wide model, built on first use.
    pub fn standard() -> &'static ReferenceModel {
        static MODEL: OnceLock<ReferenceModel> = OnceLock::new();
        MODEL.get_or_init(|| Self::build(&GROUPS))
    }

    fn build(groups: &'static [ThemeGroup]) -> Self {
        let mut ordered: Vec<&'static ThemeGroup> = groups.iter().collect();
        ordered.sort_by_key(|g| g.order);
        let mut index = HashMap::new();
        let mut rank = 0usize;
        for group in ordered.iter().copied() {
            for descriptor in group.themes {
                index.entry(descriptor.label).or_insert(ThemeEntry { group, descriptor, rank });
                rank += 1;
            }
        }
        Self { groups: ordered, index }
    }

    /// Groups in display order.
    pub fn groups(&self) -> &[&'static ThemeGroup] { &self.groups }

    pub fn group(&self, key: &str) -> Option<&'static ThemeGroup> {
        self.groups.iter().copied().find(|g| g.key == key)
    }

    pub fn lookup(&self, label: &str) -> Option<ThemeEntry> {
        self.index.get(label).copied()
    }

    /// Resolves the point-marker variant of `label`, if the model has one.
    pub fn lookup_marker(&self, label: &str) -> Option<ThemeEntry> {
        self.lookup(&marker_label(label))
    }

    pub fn colors(&self, label: &str) -> Option<(Option<&'static str>, &'static str)> {
        self.lookup(label).map(|e| (e.descriptor.fill, e.descriptor.outline))
    }

    pub fn find_by_output_name(&self, output_name: &str) -> Option<ThemeEntry> {
        self.index.values().copied().find(|e| e.descriptor.output_name == output_name)
    }

    /// Every label in canonical order.
    pub fn all_labels(&self) -> Vec<&'static str> {
        self.groups.iter().flat_map(|g| g.themes.iter().map(|t| t.label)).collect()
    }

    pub fn theme_counts(&self) -> ThemeCounts {
        let per_group: Vec<(&'static str, usize)> = self.groups.iter().map(|g| (g.key, g.themes.len())).collect();
        let total = per_group.iter().map(|(_, n)| n).sum();
        ThemeCounts { per_group, total }
    }

    /// Folder name for `group`, padded so that lexical order equals group order.
    pub fn folder_name(&self, group: &ThemeGroup) -> String {
        let max = self.groups.iter().map(|g| g.order).max().unwrap_or(group.order);
        group.folder_name(max.to_string().len())
    }
}

pub fn marker_label(label: &str) -> String {
    format!("{label}{MARKER_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn labels_and_output_names_are_unique() {
        let model = ReferenceModel::standard();
        let labels = model.all_labels();
        let unique: HashSet<_> = labels.iter().collect();
        assert_eq!(labels.len(), unique.len());
        let outputs: HashSet<_> = model.groups().iter().flat_map(|g| g.themes.iter().map(|t| t.output_name)).collect();
        assert_eq!(outputs.len(), labels.len());
    }

    #[test]
    fn group_orders_are_one_through_n() {
        let model = ReferenceModel::standard();
        let orders: Vec<u8> = model.groups().iter().map(|g| g.order).collect();
        assert_eq!(orders, (1..=7).collect::<Vec<u8>>());
    }

    #[test]
    fn folder_name_replaces_spaces() {
        let model = ReferenceModel::standard();
        let group = model.group("Area_do_Imovel").expect("group");
        assert_eq!(model.folder_name(group), "1-Área_do_Imóvel");
        assert_eq!(group.folder_name(2), "01-Área_do_Imóvel");
    }

    #[test]
    fn ranks_follow_canonical_order() {
        let model = ReferenceModel::standard();
        let first = model.lookup("Área do Imovel").expect("first");
        let last = model.lookup("Uso Restrito total").expect("last");
        assert_eq!(first.rank, 0);
        assert_eq!(last.rank, model.theme_counts().total - 1);
    }
}
