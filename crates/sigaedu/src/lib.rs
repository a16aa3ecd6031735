//! Client for the SIGA-EDU academic records portal.
//!
//! Logs in with the student's credentials, walks the grade pages
//! (enrollments → periods → class record) and turns the HTML into plain
//! data.
//!
//! ```no_run
//! # async fn run() -> Result<(), sigaedu::SigaError> {
//! use sigaedu::Scraper;
//!
//! let mut scraper = Scraper::login("aluno", "senha", "https://siga.example", None).await?;
//! let matriculas = scraper.get_matriculas().await?;
//! for matricula in &matriculas {
//!     let periodos = scraper.get_periodos(matricula).await?;
//!     if let Some(periodo) = periodos.iter().last() {
//!         let diario = scraper.get_diario(periodo).await?;
//!         for disciplina in diario.get_disciplinas() {
//!             println!("{}: {:?}", disciplina.nome, disciplina.get_medias());
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod navigator;
pub mod parse;
pub mod session;
mod types;

pub use config::PortalConfig;
pub use error::SigaError;
pub use navigator::Scraper;
pub use parse::{parse_page, Page, PageKind};
pub use session::{Session, SessionKey, SessionState};
pub use types::*;
