use std::fs;
use std::path::PathBuf;

use scrapyard_core::{Error, ErrorKind, Result};
use tracing::{error, info};

use crate::controller::WebController;
use crate::extraction::{Extraction, ExtractionManager};
use crate::interaction::{Interaction, InteractionManager};
use crate::ocr::{NullOcrEngine, OcrEngine};

/// One declared scrape target: a connection name, its domain, its input
/// file of links, and the startup/interaction/extraction plan to run
/// against each link.
///
/// Mirrors `scraper/scraper/etl/target.py::TargetConfig` one-to-one.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TargetPlan {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub composite: bool,
    pub input_file: PathBuf,
    #[serde(default)]
    pub startup: Vec<Interaction>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    #[serde(default)]
    pub extractions: Vec<Extraction>,
}

/// Drives every configured target's scrape through the controller, grounded
/// on `scraper/scraper/etl/target.py::TargetManager`.
pub struct TargetEngine {
    targets: Vec<TargetPlan>,
    retry_limit: u32,
}

impl TargetEngine {
    pub fn new(targets: Vec<TargetPlan>) -> Self {
        Self {
            targets,
            retry_limit: 3,
        }
    }

    /// Runs every target's full scrape in turn. One target's failure is
    /// logged and does not stop the rest.
    pub async fn execute(&self, controller: &WebController) {
        let ocr = NullOcrEngine::default();
        for target in &self.targets {
            match Self::read_input(target) {
                Ok((links, supplemental)) => {
                    self.scrape_target(controller, &ocr, target, &links, &supplemental).await;
                }
                Err(e) => error!(target = %target.name, error = %e, "failed to read input file"),
            }
        }
    }

    fn read_input(target: &TargetPlan) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let contents = fs::read_to_string(&target.input_file).map_err(|e| {
            Error::with_source(
                ErrorKind::Io,
                format!(
                    "failed to read links from input file '{}' for '{}'",
                    target.input_file.display(),
                    target.name
                ),
                Box::new(e),
            )
        })?;

        let mut links = Vec::new();
        let mut supplemental = Vec::new();
        for line in contents.lines() {
            let mut fields = line.trim().split(',').map(str::to_string);
            let Some(link) = fields.next() else { continue };
            if link.is_empty() {
                continue;
            }
            links.push(link);
            supplemental.push(fields.collect());
        }
        Ok((links, supplemental))
    }

    async fn scrape_target(
        &self,
        controller: &WebController,
        ocr: &dyn OcrEngine,
        target: &TargetPlan,
        links: &[String],
        supplemental: &[Vec<String>],
    ) {
        if self.startup(controller, target).await.is_err() {
            error!(target = %target.name, "startup failed, skipping target");
            return;
        }

        for (link, supp) in links.iter().zip(supplemental.iter()) {
            if let Err(e) = self.get_target_link(controller, target, link, 0).await {
                error!(target = %target.name, link, error = %e, "failed to scrape link");
                continue;
            }

            let Some(driver) = controller.driver(&target.name).await else {
                error!(target = %target.name, "no driver attached after successful fetch");
                continue;
            };

            for interaction in &target.interactions {
                if let Err(e) = InteractionManager::perform(&driver, interaction).await {
                    error!(target = %target.name, error = %e, "interaction failed");
                }
            }

            let ocr_driver = if target.composite {
                controller.driver(&format!("{}_composite", target.name)).await
            } else {
                None
            };

            for extraction in &target.extractions {
                ExtractionManager::run(&driver, ocr_driver.as_ref(), ocr, extraction, supp).await;
            }
        }
    }

    /// Runs `target.startup`'s interactions against `target.domain` after
    /// fetching it. No-op (logged) when no startup actions are declared.
    async fn startup(&self, controller: &WebController, target: &TargetPlan) -> Result<()> {
        if target.startup.is_empty() {
            info!(target = %target.name, "no startup actions specified");
            return Ok(());
        }

        Box::pin(self.get_target_link(controller, target, &target.domain, 0)).await?;
        let Some(driver) = controller.driver(&target.name).await else {
            return Err(Error::new(ErrorKind::Resource, format!("no driver attached for '{}'", target.name)));
        };

        for interaction in &target.startup {
            InteractionManager::perform(&driver, interaction).await?;
        }
        Ok(())
    }

    /// Fetches `link` for `target`, rotating the proxy and redoing startup on
    /// proxy exhaustion, up to `retry_limit` times.
    async fn get_target_link(
        &self,
        controller: &WebController,
        target: &TargetPlan,
        link: &str,
        retry_count: u32,
    ) -> Result<()> {
        match controller.fetch(&target.name, link).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::Proxy && retry_count < self.retry_limit => {
                info!(target = %target.name, retry_count, "proxy exhausted, rotating and retrying");
                controller.rotate_proxy(&target.name).await;
                Box::pin(self.startup(controller, target)).await?;
                Box::pin(self.get_target_link(controller, target, link, retry_count + 1)).await
            }
            Err(e) if e.kind() == ErrorKind::Proxy => {
                error!(target = %target.name, link, "exceeded retry limit");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_input_splits_link_and_supplemental_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://example.com/a,CUSIP1,Issuer A").unwrap();
        writeln!(file, "https://example.com/b,CUSIP2,Issuer B").unwrap();

        let target = TargetPlan {
            name: "test".to_string(),
            domain: "https://example.com".to_string(),
            composite: false,
            input_file: file.path().to_path_buf(),
            startup: vec![],
            interactions: vec![],
            extractions: vec![],
        };

        let (links, supplemental) = TargetEngine::read_input(&target).unwrap();
        assert_eq!(links, vec!["https://example.com/a", "https://example.com/b"]);
        assert_eq!(supplemental[0], vec!["CUSIP1", "Issuer A"]);
    }

    #[test]
    fn read_input_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://example.com/a").unwrap();
        writeln!(file).unwrap();

        let target = TargetPlan {
            name: "test".to_string(),
            domain: "https://example.com".to_string(),
            composite: false,
            input_file: file.path().to_path_buf(),
            startup: vec![],
            interactions: vec![],
            extractions: vec![],
        };

        let (links, _) = TargetEngine::read_input(&target).unwrap();
        assert_eq!(links.len(), 1);
    }
}
