//! Navigation through the grade pages of the portal.
//!
//! The portal keeps the selected enrollment on the server, so the calls
//! must follow the order the pages do:
//! 1. [`Scraper::get_matriculas`] opens the enrollment list
//! 2. [`Scraper::get_periodos`] selects an enrollment and lists its periods
//! 3. [`Scraper::get_diario`] loads the class record of one of those periods

use crate::config::PortalConfig;
use crate::error::SigaError;
use crate::parse::{parse_diario, parse_matriculas, parse_periodos};
use crate::session::{Session, SessionState};
use crate::types::{Diario, Matricula, Matriculas, Periodo, Periodos};
use tracing::info;

/// Home page, holds the side menu leading to the enrollment list.
const INICIAL_PATH: &str = "/sigaept-edu-web-v1/pages/inicial.jsf";
/// Enrollment selection page, answers with the period list.
const MATRICULA_PATH: &str =
    "/sigaept-edu-web-v1/pages/AlunoVisualizarNotas/AlunoVisualizarMatricula.jsf";
/// Class record page, answers with the subjects table.
const DIARIO_PATH: &str =
    "/sigaept-edu-web-v1/pages/AlunoVisualizarNotas/AlunoVisualizarInformacoesDiario.jsf";

const MENU_NOTAS_ITEM: &str = "menuLateralSiga:listaMenu:1:listaCDUFilho:0:_";

/// Where the portal's server-side navigation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Navigation {
    /// Nothing opened yet (or the last step failed)
    Start,
    /// Enrollment list is open
    Matriculas,
    /// An enrollment is selected and its periods are listed
    Matricula(i64),
}

/// Client for the grade pages of a SIGA-EDU portal.
pub struct Scraper {
    session: Session,
    user: String,
    navigation: Navigation,
}

impl Scraper {
    /// Logs into the portal at `base_url`.
    ///
    /// `app_id` is the application identifier sent as `User-Agent`; `None`
    /// uses the crate default.
    pub async fn login(
        user: &str,
        password: &str,
        base_url: &str,
        app_id: Option<&str>,
    ) -> Result<Self, SigaError> {
        let mut config = PortalConfig::new(base_url);
        if let Some(app_id) = app_id {
            config = config.with_user_agent(app_id);
        }
        Self::with_config(user, password, config).await
    }

    /// Logs into the portal described by `config`.
    pub async fn with_config(
        user: &str,
        password: &str,
        config: PortalConfig,
    ) -> Result<Self, SigaError> {
        let mut session = Session::new(&config)?;
        session.login(user, password).await?;

        Ok(Self {
            session,
            user: user.to_string(),
            navigation: Navigation::Start,
        })
    }

    /// Lists the student's enrollments.
    pub async fn get_matriculas(&mut self) -> Result<Matriculas, SigaError> {
        info!(user = %self.user, session = %self.session.key(), "Fetching enrollments");
        self.navigation = Navigation::Start;

        let form = [
            ("menuLateralSiga", "menuLateralSiga"),
            (MENU_NOTAS_ITEM, MENU_NOTAS_ITEM),
        ];
        let html = self.session.post(INICIAL_PATH, &form).await?;
        let matriculas = parse_matriculas(&html)?;

        self.navigation = Navigation::Matriculas;
        info!(count = matriculas.len(), "Fetched enrollments");
        Ok(matriculas)
    }

    /// Selects `matricula` on the portal and lists its periods.
    ///
    /// Enrollment handles only come out of [`Scraper::get_matriculas`]:
    ///
    /// ```compile_fail
    /// let matricula = sigaedu::Matricula::new(1234, "Informática".to_string());
    /// ```
    pub async fn get_periodos(&mut self, matricula: &Matricula) -> Result<Periodos, SigaError> {
        if self.navigation == Navigation::Start {
            return Err(SigaError::state(
                "enrollment list has not been opened in this session",
            ));
        }

        info!(
            user = %self.user,
            matricula = matricula.id(),
            "Fetching periods"
        );
        self.navigation = Navigation::Start;

        let id = matricula.id().to_string();
        let form = [
            ("busca", "busca"),
            ("busca:matriculas", id.as_str()),
            ("busca:j_id73", "Avançar"),
        ];
        let html = self.session.post(MATRICULA_PATH, &form).await?;
        let periodos = parse_periodos(&html, matricula.id())?;

        self.navigation = Navigation::Matricula(matricula.id());
        info!(
            matricula = matricula.id(),
            count = periodos.len(),
            "Fetched periods"
        );
        Ok(periodos)
    }

    /// Loads the class record of `periodo`.
    ///
    /// The period's enrollment must be the one selected by the last
    /// [`Scraper::get_periodos`] call, otherwise the portal would answer for
    /// a different enrollment.
    pub async fn get_diario(&mut self, periodo: &Periodo) -> Result<Diario, SigaError> {
        match self.navigation {
            Navigation::Matricula(selected) if selected == periodo.matricula_id() => {}
            Navigation::Matricula(selected) => {
                return Err(SigaError::state(format!(
                    "period {} belongs to enrollment {}, but enrollment {} is selected",
                    periodo.id(),
                    periodo.matricula_id(),
                    selected
                )));
            }
            _ => {
                return Err(SigaError::state(format!(
                    "enrollment {} is not selected; list its periods first",
                    periodo.matricula_id()
                )));
            }
        }

        info!(
            user = %self.user,
            matricula = periodo.matricula_id(),
            periodo = periodo.id(),
            "Fetching class record"
        );

        let id = periodo.id().to_string();
        let form = [
            ("AJAXREQUEST", "_viewRoot"),
            ("busca", "busca"),
            ("busca:periodoLetivo", id.as_str()),
            ("busca:classes:j_id78fsp", ""),
            ("busca:classes:j_id81fsp", ""),
            ("busca:j_id74", "busca:j_id74"),
            ("", ""),
        ];
        let html = self.session.post(DIARIO_PATH, &form).await?;
        let diario = parse_diario(&html, periodo.matricula_id(), periodo.id())?;

        info!(
            periodo = periodo.id(),
            subjects = diario.len(),
            "Fetched class record"
        );
        Ok(diario)
    }

    /// Current `JSESSIONID` of the underlying session.
    pub fn session_id(&self) -> Option<String> {
        self.session.session_id()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}
