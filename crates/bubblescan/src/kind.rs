use serde::{Deserialize, Serialize};

/// Expected circles per unit of page area for student-id grids.
const STUDENT_ID_DENSITY: f32 = 200.0;

/// What a region of the answer sheet contains.
///
/// Serialized in snake case; the labels used by the sheet designer are
/// accepted as aliases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RectangleKind {
    #[serde(alias = "Coluna de Questões (A e C PAS ou Enem)")]
    QuestionColumn,
    #[serde(alias = "Tipo B")]
    TypeB,
    /// Enrollment-number grid.
    #[serde(alias = "Matricula")]
    StudentId,
    #[serde(alias = "Outro")]
    Other,
    #[serde(alias = "Temp")]
    Temp,
    /// A box holding a single sample bubble used to calibrate the size hint.
    #[serde(alias = "Exemplo de Circulo")]
    CircleExample,
}

impl RectangleKind {
    pub fn label(&self) -> &'static str {
        match self {
            RectangleKind::QuestionColumn => "question_column",
            RectangleKind::TypeB => "type_b",
            RectangleKind::StudentId => "student_id",
            RectangleKind::Other => "other",
            RectangleKind::Temp => "temp",
            RectangleKind::CircleExample => "circle_example",
        }
    }

    /// Expected bubble count for a region covering `area_ratio` of the page.
    pub fn expected_count(&self, area_ratio: f32) -> Option<usize> {
        match self {
            RectangleKind::StudentId => Some((area_ratio.max(0.0) * STUDENT_ID_DENSITY) as usize),
            _ => None,
        }
    }

    /// Whether incomplete rows are dropped after detection.
    pub fn filters_rows(&self) -> bool {
        matches!(self, RectangleKind::StudentId)
    }

    /// Whether the caller's circle-size hint applies to this region.
    pub fn uses_size_hint(&self) -> bool {
        !matches!(self, RectangleKind::CircleExample)
    }
}

impl std::fmt::Display for RectangleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
