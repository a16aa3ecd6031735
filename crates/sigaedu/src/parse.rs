//! Pure parsers for the portal pages.
//!
//! Nothing here touches the network: every function takes the page markup
//! and returns data or a [`SigaError::Parse`] when the page does not have
//! the shape we expect (usually a sign the portal changed).

use crate::error::SigaError;
use crate::types::{Diario, Disciplina, Matricula, Matriculas, Notas, Periodo, Periodos};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

/// Default option of the enrollment dropdown.
pub const MATRICULA_PLACEHOLDER: &str = "Selecione um número de matrícula!";
/// Default option of the period dropdown.
pub const PERIODO_PLACEHOLDER: &str = "Selecione um período letivo";

const MATRICULAS_SELECT_ID: &str = "busca:matriculas";
const PERIODOS_SELECT_ID: &str = "busca:periodoLetivo";

// Static selectors for parsing - compiled once
static VIEWSTATE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"input[id="javax.faces.ViewState"]"#).unwrap());
static LOGIN_ERROR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.error").unwrap());
static MATRICULAS_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"select[id="busca:matriculas"]"#).unwrap());
static PERIODOS_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"select[id="busca:periodoLetivo"]"#).unwrap());
static OPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("option").unwrap());
static SUBJECTS_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"table > tbody[id="busca:classes:tb"]"#).unwrap());
static GRADE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div > div").unwrap());
static LABEL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("label").unwrap());
static SUBJECT_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\S+\s+-\s+(.+?)\s*$").unwrap());

/// The pages this crate knows how to read, with the context each needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Login,
    Matriculas,
    Periodos { matricula_id: i64 },
    Diario { matricula_id: i64, periodo_id: i64 },
}

/// Result of [`parse_page`].
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    Login { error: Option<String> },
    Matriculas(Matriculas),
    Periodos(Periodos),
    Diario(Diario),
}

/// Parses `markup` as a page of the given kind.
pub fn parse_page(markup: &str, kind: PageKind) -> Result<Page, SigaError> {
    match kind {
        PageKind::Login => Ok(Page::Login {
            error: parse_login_error(markup),
        }),
        PageKind::Matriculas => parse_matriculas(markup).map(Page::Matriculas),
        PageKind::Periodos { matricula_id } => {
            parse_periodos(markup, matricula_id).map(Page::Periodos)
        }
        PageKind::Diario {
            matricula_id,
            periodo_id,
        } => parse_diario(markup, matricula_id, periodo_id).map(Page::Diario),
    }
}

/// Value of the first `javax.faces.ViewState` hidden input, if any.
pub fn parse_viewstate(markup: &str) -> Option<String> {
    let document = Html::parse_document(markup);
    document
        .select(&VIEWSTATE_SELECTOR)
        .next()
        .and_then(|el| el.value().attr("value"))
        .map(str::to_string)
}

/// Message of the login error box, if the page shows one.
pub fn parse_login_error(markup: &str) -> Option<String> {
    let document = Html::parse_document(markup);
    document.select(&LOGIN_ERROR_SELECTOR).next().map(|el| {
        let text = collapse_whitespace(&el.text().collect::<String>());
        if text.is_empty() {
            "portal reported an error".to_string()
        } else {
            text
        }
    })
}

/// Parses the enrollment dropdown of the home page.
pub fn parse_matriculas(markup: &str) -> Result<Matriculas, SigaError> {
    let document = Html::parse_document(markup);
    let options = parse_select(
        &document,
        &MATRICULAS_SELECTOR,
        MATRICULAS_SELECT_ID,
        MATRICULA_PLACEHOLDER,
    )?;
    Ok(Matriculas::new(
        options
            .into_iter()
            .map(|(id, label)| Matricula::new(id, label))
            .collect(),
    ))
}

/// Parses the period dropdown shown after selecting an enrollment.
pub fn parse_periodos(markup: &str, matricula_id: i64) -> Result<Periodos, SigaError> {
    let document = Html::parse_document(markup);
    let options = parse_select(
        &document,
        &PERIODOS_SELECTOR,
        PERIODOS_SELECT_ID,
        PERIODO_PLACEHOLDER,
    )?;
    Ok(Periodos::new(
        options
            .into_iter()
            .map(|(id, label)| Periodo::new(id, label, matricula_id))
            .collect(),
    ))
}

/// Reads `(id, label)` pairs from a `<select>`, skipping the placeholder.
fn parse_select(
    document: &Html,
    selector: &Selector,
    select_id: &str,
    placeholder: &str,
) -> Result<Vec<(i64, String)>, SigaError> {
    let select = document
        .select(selector)
        .next()
        .ok_or_else(|| SigaError::parse(format!("dropdown '{select_id}' not found")))?;

    let mut seen = HashSet::new();
    let mut options = Vec::new();

    for option in select.select(&OPTION_SELECTOR) {
        let label = collapse_whitespace(&option.text().collect::<String>());
        let value = option.value().attr("value").unwrap_or_default().trim();

        if label == placeholder || value.is_empty() {
            continue;
        }

        let id = value.parse::<i64>().map_err(|_| {
            SigaError::parse(format!("non-numeric id '{value}' in dropdown '{select_id}'"))
        })?;

        if !seen.insert(id) {
            return Err(SigaError::parse(format!(
                "duplicate id {id} in dropdown '{select_id}'"
            )));
        }

        options.push((id, label));
    }

    Ok(options)
}

/// Parses the class record table of one enrollment and period.
pub fn parse_diario(
    markup: &str,
    matricula_id: i64,
    periodo_id: i64,
) -> Result<Diario, SigaError> {
    let document = Html::parse_document(markup);
    let tbody = document
        .select(&SUBJECTS_SELECTOR)
        .next()
        .ok_or_else(|| SigaError::parse("subjects table 'busca:classes:tb' not found"))?;

    let mut diario = Diario::new(matricula_id, periodo_id);

    for (index, row) in child_elements(tbody, "tr").enumerate() {
        let disciplina = parse_subject_row(row)
            .map_err(|e| SigaError::parse(format!("subject row {}: {}", index + 1, e)))?;

        if diario.get_disciplina(&disciplina.nome).is_ok() {
            return Err(SigaError::parse(format!(
                "duplicate subject '{}'",
                disciplina.nome
            )));
        }
        diario.add_disciplina(disciplina);
    }

    Ok(diario)
}

/// Parses a single row of the subjects table.
fn parse_subject_row(row: ElementRef) -> Result<Disciplina, String> {
    let cells: Vec<ElementRef> = child_elements(row, "td").collect();
    let cell = |n: usize| {
        cells
            .get(n - 1)
            .copied()
            .ok_or_else(|| format!("missing column {n}"))
    };

    // Column 1: "<code> - <name>"
    let raw_name = own_text(cell(1)?)
        .into_iter()
        .next()
        .ok_or("empty subject name")?;
    let nome = SUBJECT_NAME_REGEX
        .captures(&raw_name)
        .map(|caps| caps[1].to_string())
        .unwrap_or(raw_name);

    // Column 3: one inner div per grade entry
    let mut notas = Notas::new();
    for entry in cell(3)?.select(&GRADE_SELECTOR) {
        for raw in own_text(entry) {
            let (label, value) = parse_nota(&raw).map_err(|e| e.to_string())?;
            notas.insert(label, value);
        }
    }

    // Column 4: final average inside a label
    let media_text = cell(4)?
        .select(&LABEL_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>())
        .ok_or("missing final average")?;
    let media_text = media_text.trim();
    let media_final = if media_text.is_empty() {
        None
    } else {
        Some(parse_decimal(media_text).map_err(|e| e.to_string())?)
    };

    // Column 6: status
    let status = collapse_whitespace(&cell(6)?.text().collect::<String>());

    Ok(Disciplina::new(nome, notas, media_final, status))
}

/// Splits a raw grade entry into label and value.
///
/// Handles the shapes the portal uses:
/// - `1 - Bimestre 1 - Média: 8.5` (the leading ordinal is dropped)
/// - `1º trimestre - Média: 8.5`
/// - anything else is kept as a label without value
pub fn parse_nota(raw: &str) -> Result<(String, Option<f64>), SigaError> {
    let raw = raw.trim();
    let cleaned = raw.replace("Média: ", "");
    let parts: Vec<&str> = cleaned.split(" - ").collect();

    let (label, value) = match parts.as_slice() {
        [_, label, value] | [label, value] => (label.trim(), value.trim()),
        _ => return Ok((raw.to_string(), None)),
    };

    Ok((label.to_string(), Some(parse_decimal(value)?)))
}

/// Parses a number written with either `.` or `,` as decimal separator.
fn parse_decimal(text: &str) -> Result<f64, SigaError> {
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| SigaError::parse(format!("'{text}' is not a number")))
}

/// Direct element children of `parent` with the given tag name.
fn child_elements<'a>(
    parent: ElementRef<'a>,
    tag: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == tag)
}

/// Non-blank text nodes directly under `element`, trimmed.
fn own_text(element: ElementRef) -> Vec<String> {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN: &str = include_str!("../tests/fixtures/login.html");
    const LOGIN_ERROR: &str = include_str!("../tests/fixtures/login_error.html");
    const INICIAL: &str = include_str!("../tests/fixtures/inicial.html");
    const PERIODOS: &str = include_str!("../tests/fixtures/periodos.html");
    const DIARIO: &str = include_str!("../tests/fixtures/diario.html");

    #[test]
    fn test_viewstate() {
        assert_eq!(parse_viewstate(LOGIN).as_deref(), Some("j_id1"));
        assert_eq!(parse_viewstate("<html><body></body></html>"), None);
    }

    #[test]
    fn test_login_error() {
        assert_eq!(parse_login_error(LOGIN), None);
        assert_eq!(
            parse_login_error(LOGIN_ERROR).as_deref(),
            Some("Usuário ou senha inválidos.")
        );
    }

    #[test]
    fn test_matriculas_skip_placeholder() {
        let matriculas = parse_matriculas(INICIAL).unwrap();
        assert_eq!(matriculas.ids(), vec![1234, 5678]);
        assert_eq!(
            matriculas.get(1234).unwrap().label(),
            "201510001 - Técnico em Informática Integrado"
        );
        assert!(matriculas.get(0).is_none());
    }

    #[test]
    fn test_periodos() {
        let periodos = parse_periodos(PERIODOS, 1234).unwrap();
        assert_eq!(periodos.ids(), vec![41, 42]);
        let periodo = periodos.get(42).unwrap();
        assert_eq!(periodo.matricula_id(), 1234);
        assert_eq!(periodo.label(), "2017/1 - 06/02/2017 a 07/07/2017");
    }

    #[test]
    fn test_missing_dropdown_is_parse_error() {
        assert!(matches!(
            parse_matriculas(PERIODOS),
            Err(SigaError::Parse { .. })
        ));
        assert!(matches!(
            parse_periodos(INICIAL, 1),
            Err(SigaError::Parse { .. })
        ));
    }

    #[test]
    fn test_duplicate_and_bad_ids() {
        let dup = r#"<select id="busca:matriculas">
            <option value="1">A</option><option value="1">B</option></select>"#;
        assert!(matches!(parse_matriculas(dup), Err(SigaError::Parse { .. })));

        let bad = r#"<select id="busca:matriculas"><option value="x1">A</option></select>"#;
        assert!(matches!(parse_matriculas(bad), Err(SigaError::Parse { .. })));
    }

    #[test]
    fn test_diario() {
        let diario = parse_diario(DIARIO, 1234, 42).unwrap();
        let nomes: Vec<_> = diario.get_disciplinas().iter().map(|d| d.nome.as_str()).collect();
        assert_eq!(nomes, vec!["Matemática", "Física", "Filosofia"]);

        let matematica = diario.get_disciplina("Matemática").unwrap();
        let labels: Vec<_> = matematica.notas.labels().collect();
        assert_eq!(
            labels,
            vec![
                "Bimestre 1",
                "Rec. Parcial 1",
                "Bimestre 2",
                "Rec. Parcial 2",
                "Bimestre 3",
                "Bimestre 4"
            ]
        );
        assert_eq!(matematica.media_final, Some(9.5));
        assert_eq!(matematica.status, "Aprovado");
        assert_eq!(
            matematica.get_medias().unwrap().known(),
            vec![10.0, 9.0, 9.0, 10.0]
        );

        let fisica = diario.get_disciplina("Física").unwrap();
        assert_eq!(fisica.notas.get("1º trimestre"), Some(Some(6.5)));
        assert_eq!(fisica.media_final, None);
        assert_eq!(fisica.status, "Cursando");

        let filosofia = diario.get_disciplina("Filosofia").unwrap();
        assert_eq!(filosofia.notas.get("Sem lançamento"), Some(None));
        assert_eq!(filosofia.get_medias(), None);
    }

    #[test]
    fn test_diario_without_table() {
        assert!(matches!(
            parse_diario(INICIAL, 1, 1),
            Err(SigaError::Parse { .. })
        ));
    }

    #[test]
    fn test_diario_row_missing_columns() {
        let markup = r#"<table><tbody id="busca:classes:tb">
            <tr><td>ABC - Química</td><td></td><td></td></tr>
        </tbody></table>"#;
        let err = parse_diario(markup, 1, 1).unwrap_err();
        assert!(err.to_string().contains("subject row 1"));
    }

    #[test]
    fn test_parse_nota_shapes() {
        assert_eq!(
            parse_nota("1 - Bimestre 1 - Média: 8.5").unwrap(),
            ("Bimestre 1".to_string(), Some(8.5))
        );
        assert_eq!(
            parse_nota("1º trimestre - Média: 7,25").unwrap(),
            ("1º trimestre".to_string(), Some(7.25))
        );
        assert_eq!(
            parse_nota("  Sem lançamento ").unwrap(),
            ("Sem lançamento".to_string(), None)
        );
        assert!(parse_nota("Bimestre 1 - Média: N/A").is_err());
    }

    #[test]
    fn test_parse_page_dispatch() {
        match parse_page(PERIODOS, PageKind::Periodos { matricula_id: 9 }).unwrap() {
            Page::Periodos(periodos) => assert_eq!(periodos.len(), 2),
            other => panic!("unexpected page {other:?}"),
        }
        assert_eq!(
            parse_page(LOGIN_ERROR, PageKind::Login).unwrap(),
            Page::Login {
                error: Some("Usuário ou senha inválidos.".to_string())
            }
        );
    }
}
