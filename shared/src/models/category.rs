//! Scoring categories

use serde::{Deserialize, Serialize};

/// Scoring bucket of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Accumulated coursework
    Acumulativo,
    Examen,
    /// Make-up work
    Reposicion,
}

impl Category {
    /// Every category, in reporting order
    pub const ALL: [Category; 3] = [Category::Acumulativo, Category::Examen, Category::Reposicion];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Acumulativo => "ACUMULATIVO",
            Category::Examen => "EXAMEN",
            Category::Reposicion => "REPOSICION",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ACUMULATIVO" => Some(Category::Acumulativo),
            "EXAMEN" => Some(Category::Examen),
            "REPOSICION" => Some(Category::Reposicion),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Acumulativo => write!(f, "Acumulativo"),
            Category::Examen => write!(f, "Examen"),
            Category::Reposicion => write!(f, "Reposición"),
        }
    }
}

/// Evaluation type as the console submits it.
///
/// `Normal` evaluations feed the accumulated category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationTipo {
    Normal,
    Examen,
    Reposicion,
}

impl From<EvaluationTipo> for Category {
    fn from(tipo: EvaluationTipo) -> Self {
        match tipo {
            EvaluationTipo::Normal => Category::Acumulativo,
            EvaluationTipo::Examen => Category::Examen,
            EvaluationTipo::Reposicion => Category::Reposicion,
        }
    }
}

impl From<Category> for EvaluationTipo {
    fn from(category: Category) -> Self {
        match category {
            Category::Acumulativo => EvaluationTipo::Normal,
            Category::Examen => EvaluationTipo::Examen,
            Category::Reposicion => EvaluationTipo::Reposicion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_maps_to_acumulativo() {
        assert_eq!(Category::from(EvaluationTipo::Normal), Category::Acumulativo);
        assert_eq!(EvaluationTipo::from(Category::Acumulativo), EvaluationTipo::Normal);
    }

    #[test]
    fn tipo_deserializes_from_console_encoding() {
        let tipo: EvaluationTipo = serde_json::from_str("\"REPOSICION\"").unwrap();
        assert_eq!(Category::from(tipo), Category::Reposicion);
    }

    #[test]
    fn category_str_round_trip() {
        for c in Category::ALL {
            assert_eq!(Category::from_str(c.as_str()), Some(c));
        }
        assert_eq!(Category::from_str("NORMAL"), None);
    }
}
