/// Types for data read from the portal
use crate::error::SigaError;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2}/\d{2}/\d{4})\b").unwrap());

/// An enrollment (matrícula) listed on the portal.
///
/// Only obtainable from [`crate::Scraper::get_matriculas`] (or the enrollment
/// page parser), which makes it a handle proving the enrollment list was
/// visited in this session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Matricula {
    id: i64,
    label: String,
}

impl Matricula {
    pub(crate) fn new(id: i64, label: String) -> Self {
        Self { id, label }
    }

    /// Server-assigned enrollment id.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Course/program description.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Enrollments in the order the portal listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Matriculas(Vec<Matricula>);

impl Matriculas {
    pub(crate) fn new(items: Vec<Matricula>) -> Self {
        Self(items)
    }

    pub fn get(&self, id: i64) -> Option<&Matricula> {
        self.0.iter().find(|m| m.id == id)
    }

    pub fn find_by_label(&self, label: &str) -> Option<&Matricula> {
        self.0.iter().find(|m| m.label == label)
    }

    pub fn ids(&self) -> Vec<i64> {
        self.0.iter().map(|m| m.id).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Matricula> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Matriculas {
    type Item = &'a Matricula;
    type IntoIter = std::slice::Iter<'a, Matricula>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An academic period (período letivo) of one enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Periodo {
    id: i64,
    label: String,
    matricula_id: i64,
}

impl Periodo {
    pub(crate) fn new(id: i64, label: String, matricula_id: i64) -> Self {
        Self {
            id,
            label,
            matricula_id,
        }
    }

    /// Server-assigned period id.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Date-range description, as shown by the portal.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Enrollment this period was listed under.
    pub fn matricula_id(&self) -> i64 {
        self.matricula_id
    }

    /// Start and end dates found in the label (`dd/mm/yyyy` format).
    ///
    /// Returns `None` unless the label holds at least two valid dates.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = DATE_REGEX
            .captures_iter(&self.label)
            .filter_map(|caps| NaiveDate::parse_from_str(&caps[1], "%d/%m/%Y").ok());
        let start = dates.next()?;
        let end = dates.next()?;
        Some((start, end))
    }
}

/// Periods of one enrollment in the order the portal listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Periodos(Vec<Periodo>);

impl Periodos {
    pub(crate) fn new(items: Vec<Periodo>) -> Self {
        Self(items)
    }

    pub fn get(&self, id: i64) -> Option<&Periodo> {
        self.0.iter().find(|p| p.id == id)
    }

    pub fn find_by_label(&self, label: &str) -> Option<&Periodo> {
        self.0.iter().find(|p| p.label == label)
    }

    pub fn ids(&self) -> Vec<i64> {
        self.0.iter().map(|p| p.id).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Periodo> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Periodos {
    type Item = &'a Periodo;
    type IntoIter = std::slice::Iter<'a, Periodo>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A single grade entry of a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nota {
    pub label: String,
    /// Missing when the portal shows the entry without a value
    pub value: Option<f64>,
}

/// Grades of a subject, kept in the order they appear on the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notas(Vec<Nota>);

impl Notas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a grade. A label already present keeps its position and
    /// takes the new value.
    pub fn insert(&mut self, label: impl Into<String>, value: Option<f64>) {
        let label = label.into();
        match self.0.iter_mut().find(|n| n.label == label) {
            Some(existing) => existing.value = value,
            None => self.0.push(Nota { label, value }),
        }
    }

    /// Value of the grade with this exact label. `None` if the label is
    /// unknown, `Some(None)` if it is listed without a value.
    pub fn get(&self, label: &str) -> Option<Option<f64>> {
        self.0.iter().find(|n| n.label == label).map(|n| n.value)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|n| n.label.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Nota> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Notas {
    type Item = &'a Nota;
    type IntoIter = std::slice::Iter<'a, Nota>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<L: Into<String>> FromIterator<(L, Option<f64>)> for Notas {
    fn from_iter<T: IntoIterator<Item = (L, Option<f64>)>>(iter: T) -> Self {
        let mut notas = Notas::new();
        for (label, value) in iter {
            notas.insert(label, value);
        }
        notas
    }
}

/// How a subject splits its school year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    /// Four bimesters
    Bimestral,
    /// Three trimesters
    Trimestral,
}

impl Regime {
    /// Number of terms in a school year under this regime.
    pub fn terms(self) -> usize {
        match self {
            Regime::Bimestral => 4,
            Regime::Trimestral => 3,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Regime::Bimestral => "bimestre",
            Regime::Trimestral => "trimestre",
        }
    }
}

/// Per-term averages of a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medias {
    pub regime: Regime,
    /// One slot per term, `None` for terms without a grade yet
    pub values: Vec<Option<f64>>,
}

impl Medias {
    /// Averages that already have a value, in term order.
    pub fn known(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }
}

/// A subject (disciplina) of a class record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disciplina {
    pub nome: String,
    pub notas: Notas,
    /// Final average, absent while the period is still open
    pub media_final: Option<f64>,
    /// Portal status text (e.g. "Aprovado", "Cursando")
    pub status: String,
}

impl Disciplina {
    pub fn new(
        nome: impl Into<String>,
        notas: Notas,
        media_final: Option<f64>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            nome: nome.into(),
            notas,
            media_final,
            status: status.into(),
        }
    }

    /// Per-term averages of the subject.
    ///
    /// The regime is detected from the grade labels: entries mentioning
    /// "bimestre" or "trimestre" (any case) are counted and the larger group
    /// wins. Other entries (partial recoveries, exams) are ignored. Missing
    /// terms are padded with `None`. Returns `None` when neither group is
    /// larger.
    pub fn get_medias(&self) -> Option<Medias> {
        let bimestres = self.term_values(Regime::Bimestral);
        let trimestres = self.term_values(Regime::Trimestral);

        let (regime, mut values) = match bimestres.len().cmp(&trimestres.len()) {
            std::cmp::Ordering::Greater => (Regime::Bimestral, bimestres),
            std::cmp::Ordering::Less => (Regime::Trimestral, trimestres),
            std::cmp::Ordering::Equal => return None,
        };

        if values.len() < regime.terms() {
            values.resize(regime.terms(), None);
        }

        Some(Medias { regime, values })
    }

    fn term_values(&self, regime: Regime) -> Vec<Option<f64>> {
        self.notas
            .iter()
            .filter(|n| n.label.to_lowercase().contains(regime.keyword()))
            .map(|n| n.value)
            .collect()
    }
}

impl std::fmt::Display for Disciplina {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.nome)
    }
}

/// Class record (diário) of one enrollment and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diario {
    pub matricula_id: i64,
    pub periodo_id: i64,
    pub fetched_at: DateTime<Utc>,
    disciplinas: Vec<Disciplina>,
}

impl Diario {
    pub fn new(matricula_id: i64, periodo_id: i64) -> Self {
        Self {
            matricula_id,
            periodo_id,
            fetched_at: Utc::now(),
            disciplinas: Vec::new(),
        }
    }

    /// All subjects, in page order.
    pub fn get_disciplinas(&self) -> &[Disciplina] {
        &self.disciplinas
    }

    /// The subject whose name matches `nome` exactly.
    pub fn get_disciplina(&self, nome: &str) -> Result<&Disciplina, SigaError> {
        self.disciplinas
            .iter()
            .find(|d| d.nome == nome)
            .ok_or_else(|| SigaError::NotFound {
                name: nome.to_string(),
            })
    }

    /// Adds a subject, replacing in place any subject with the same name.
    pub fn add_disciplina(&mut self, disciplina: Disciplina) {
        match self.disciplinas.iter_mut().find(|d| d.nome == disciplina.nome) {
            Some(existing) => *existing = disciplina,
            None => self.disciplinas.push(disciplina),
        }
    }

    /// Removes and returns the subject named `nome`.
    pub fn remove_disciplina(&mut self, nome: &str) -> Result<Disciplina, SigaError> {
        let index = self
            .disciplinas
            .iter()
            .position(|d| d.nome == nome)
            .ok_or_else(|| SigaError::NotFound {
                name: nome.to_string(),
            })?;
        Ok(self.disciplinas.remove(index))
    }

    pub fn len(&self) -> usize {
        self.disciplinas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disciplinas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disciplina(notas: &[(&str, Option<f64>)]) -> Disciplina {
        Disciplina::new(
            "Matemática",
            notas.iter().map(|&(l, v)| (l, v)).collect(),
            None,
            "Cursando",
        )
    }

    #[test]
    fn test_medias_bimestral_skips_recovery() {
        let d = disciplina(&[
            ("Bimestre 1", Some(10.0)),
            ("Rec. Parcial 1", Some(0.0)),
            ("Bimestre 2", Some(9.0)),
            ("Rec. Parcial 2", Some(0.0)),
            ("Bimestre 3", Some(9.0)),
            ("Bimestre 4", Some(10.0)),
        ]);
        let medias = d.get_medias().unwrap();
        assert_eq!(medias.regime, Regime::Bimestral);
        assert_eq!(medias.known(), vec![10.0, 9.0, 9.0, 10.0]);
    }

    #[test]
    fn test_medias_padding() {
        let d = disciplina(&[("Bimestre 1", Some(7.0)), ("Bimestre 2", Some(8.0))]);
        assert_eq!(
            d.get_medias().unwrap().values,
            vec![Some(7.0), Some(8.0), None, None]
        );

        let d = disciplina(&[("1º trimestre", Some(6.0))]);
        let medias = d.get_medias().unwrap();
        assert_eq!(medias.regime, Regime::Trimestral);
        assert_eq!(medias.values, vec![Some(6.0), None, None]);
    }

    #[test]
    fn test_medias_undetermined() {
        assert_eq!(disciplina(&[]).get_medias(), None);
        assert_eq!(disciplina(&[("Exame final", Some(5.0))]).get_medias(), None);
        let tie = disciplina(&[("Bimestre 1", Some(5.0)), ("1º Trimestre", Some(5.0))]);
        assert_eq!(tie.get_medias(), None);
    }

    #[test]
    fn test_notas_keep_order_and_overwrite_in_place() {
        let mut notas = Notas::new();
        notas.insert("Bimestre 2", Some(9.0));
        notas.insert("Bimestre 1", Some(10.0));
        notas.insert("Bimestre 2", Some(8.0));

        let labels: Vec<_> = notas.labels().collect();
        assert_eq!(labels, vec!["Bimestre 2", "Bimestre 1"]);
        assert_eq!(notas.get("Bimestre 2"), Some(Some(8.0)));
        assert_eq!(notas.get("Bimestre 3"), None);
    }

    #[test]
    fn test_diario_lookup() {
        let mut diario = Diario::new(1, 2);
        diario.add_disciplina(disciplina(&[]));
        diario.add_disciplina(Disciplina::new("Física", Notas::new(), Some(7.5), "Aprovado"));

        for d in diario.get_disciplinas() {
            assert_eq!(diario.get_disciplina(&d.nome).unwrap(), d);
        }
        assert!(matches!(
            diario.get_disciplina("Química"),
            Err(SigaError::NotFound { .. })
        ));
        assert!(diario.get_disciplina("física").is_err());
    }

    #[test]
    fn test_diario_add_replaces_and_remove() {
        let mut diario = Diario::new(1, 2);
        diario.add_disciplina(Disciplina::new("Física", Notas::new(), None, "Cursando"));
        diario.add_disciplina(disciplina(&[]));
        diario.add_disciplina(Disciplina::new("Física", Notas::new(), Some(8.0), "Aprovado"));

        assert_eq!(diario.len(), 2);
        assert_eq!(diario.get_disciplinas()[0].status, "Aprovado");

        let removed = diario.remove_disciplina("Física").unwrap();
        assert_eq!(removed.media_final, Some(8.0));
        assert_eq!(diario.len(), 1);
        assert!(diario.remove_disciplina("Física").is_err());
    }

    #[test]
    fn test_periodo_date_range() {
        let periodo = Periodo::new(7, "2017/1 - 06/02/2017 a 07/07/2017".to_string(), 1);
        let (start, end) = periodo.date_range().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2017, 2, 6).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2017, 7, 7).unwrap());

        let periodo = Periodo::new(8, "2017/2".to_string(), 1);
        assert_eq!(periodo.date_range(), None);
    }
}
