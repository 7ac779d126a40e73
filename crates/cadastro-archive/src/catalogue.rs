/// Layer names SICAR exports, in lookup order. The marker layer comes first
/// so its name is claimed before the plain preservation-area entry.
pub const EXPECTED_LAYERS: [&str; 7] = [
    "MARCADORES_Area_de_Preservacao_Permanente",
    "Area_de_Preservacao_Permanente",
    "Area_do_Imovel",
    "Cobertura_do_Solo",
    "Reserva_Legal",
    "Servidao_Administrativa",
    "Area_de_Uso_Restrito",
];

/// Columns a layer must carry to be accepted (compared case-insensitively).
pub const REQUIRED_COLUMNS: [&str; 3] = ["tema", "area", "recibo"];

const MARKER_TOKEN: &str = "marcadores";

/// Maps an archive or file base name to the expected layer it stands for.
///
/// Case-insensitive substring match. Names containing `marcadores` can only
/// match the marker layer; every other entry rejects them.
pub fn match_expected(base_name: &str) -> Option<&'static str> {
    let lower = base_name.to_lowercase();
    let is_marker = lower.contains(MARKER_TOKEN);
    EXPECTED_LAYERS.iter().copied().find(|expected| {
        if expected.to_lowercase().starts_with(MARKER_TOKEN) {
            is_marker
        } else {
            !is_marker && lower.contains(&expected.to_lowercase())
        }
    })
}

/// Whether every required column is present in `columns`.
pub fn has_required_columns<S: AsRef<str>>(columns: &[S]) -> bool {
    REQUIRED_COLUMNS.iter().all(|required| columns.iter().any(|c| c.as_ref().eq_ignore_ascii_case(required)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_layer_is_carved_out() {
        assert_eq!(match_expected("MARCADORES_Area_de_Preservacao_Permanente"), Some("MARCADORES_Area_de_Preservacao_Permanente"));
        assert_eq!(match_expected("Area_de_Preservacao_Permanente"), Some("Area_de_Preservacao_Permanente"));
        assert_eq!(match_expected("marcadores_qualquer_coisa"), Some("MARCADORES_Area_de_Preservacao_Permanente"));
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        assert_eq!(match_expected("sicar_AREA_DO_IMOVEL_123"), Some("Area_do_Imovel"));
        assert_eq!(match_expected("Hidrografia"), None);
    }

    #[test]
    fn required_columns_ignore_case() {
        assert!(has_required_columns(&["TEMA", "Area", "recibo", "cod_imovel"]));
        assert!(!has_required_columns(&["tema", "area"]));
    }
}
