use std::time::Duration;

use scrapyard_core::{Error, ErrorKind, LocatorKind, Result};
use thirtyfour::components::SelectElement;
use thirtyfour::prelude::*;
use tracing::warn;

/// A single declared page interaction, performed before a target's
/// extractions run.
///
/// Tagged-variant model per the design notes: `click` and `dropdown` each
/// carry a locator and a wait interval, mirroring
/// `scraper/scraper/etl/interaction.py::Interaction`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "interaction_type", rename_all = "snake_case")]
pub enum Interaction {
    Click {
        locator: String,
        locator_type: String,
        #[serde(default = "default_wait")]
        wait_interval: u64,
    },
    Dropdown {
        locator: String,
        locator_type: String,
        option_text: String,
        #[serde(default = "default_wait")]
        wait_interval: u64,
    },
}

fn default_wait() -> u64 {
    10
}

/// Executes declared interactions against a live browser session, grounded
/// on `scraper/scraper/etl/interaction.py::InteractionManager`.
pub struct InteractionManager;

impl InteractionManager {
    pub async fn perform(driver: &WebDriver, interaction: &Interaction) -> Result<()> {
        match interaction {
            Interaction::Click {
                locator,
                locator_type,
                wait_interval,
            } => Self::click(driver, locator, locator_type, *wait_interval).await,
            Interaction::Dropdown {
                locator,
                locator_type,
                option_text,
                wait_interval,
            } => Self::dropdown(driver, locator, locator_type, option_text, *wait_interval).await,
        }
    }

    /// Three-tier escalation: direct click, then wait+scroll+click, then a
    /// synthesized action-chain move-then-click.
    async fn click(
        driver: &WebDriver,
        locator: &str,
        locator_type: &str,
        wait_interval: u64,
    ) -> Result<()> {
        let by = to_by(locator, locator_type)?;
        let element = find_element(driver, by.clone(), wait_interval).await?;

        if element.click().await.is_ok() {
            return Ok(());
        }

        warn!(locator, "direct click failed, escalating to wait+scroll+click");
        let wait = driver.query(by.clone()).wait(
            Duration::from_secs(wait_interval),
            Duration::from_millis(250),
        );
        let element = wait
            .single()
            .await
            .map_err(|e| Error::with_source(ErrorKind::PageModel, "element not clickable", Box::new(e)))?;
        element
            .scroll_into_view()
            .await
            .map_err(|e| Error::with_source(ErrorKind::PageModel, "failed to scroll element into view", Box::new(e)))?;

        if element.click().await.is_ok() {
            return Ok(());
        }

        warn!(locator, "scroll+click failed, escalating to action chain");
        driver
            .action_chain()
            .move_to_element_center(&element)
            .click()
            .perform()
            .await
            .map_err(|e| Error::with_source(ErrorKind::PageModel, "click failed after all escalations", Box::new(e)))
    }

    /// Same escalation as `click`, selecting a dropdown option by its
    /// visible text via the browser's native `<select>` wrapper.
    async fn dropdown(
        driver: &WebDriver,
        locator: &str,
        locator_type: &str,
        option_text: &str,
        wait_interval: u64,
    ) -> Result<()> {
        let by = to_by(locator, locator_type)?;
        let element = find_element(driver, by.clone(), wait_interval).await?;

        let select_result = select_by_text(&element, option_text).await;
        if select_result.is_ok() {
            return Ok(());
        }

        warn!(locator, "dropdown select failed, escalating to wait+scroll+select");
        let wait = driver.query(by).wait(
            Duration::from_secs(wait_interval),
            Duration::from_millis(250),
        );
        let element = wait
            .single()
            .await
            .map_err(|e| Error::with_source(ErrorKind::PageModel, "dropdown not found", Box::new(e)))?;
        element
            .scroll_into_view()
            .await
            .map_err(|e| Error::with_source(ErrorKind::PageModel, "failed to scroll dropdown into view", Box::new(e)))?;

        select_by_text(&element, option_text)
            .await
            .map_err(|e| Error::with_source(ErrorKind::PageModel, "dropdown selection failed after escalation", Box::new(e)))
    }
}

async fn select_by_text(element: &WebElement, option_text: &str) -> WebDriverResult<()> {
    let select = SelectElement::new(element).await?;
    select.select_by_visible_text(option_text).await
}

async fn find_element(driver: &WebDriver, by: By, wait_interval: u64) -> Result<WebElement> {
    if let Ok(element) = driver.find(by.clone()).await {
        return Ok(element);
    }

    driver
        .query(by)
        .wait(
            Duration::from_secs(wait_interval),
            Duration::from_millis(10),
        )
        .single()
        .await
        .map_err(|e| Error::with_source(ErrorKind::PageModel, "element not found", Box::new(e)))
}

fn to_by(locator: &str, locator_type: &str) -> Result<By> {
    let kind = LocatorKind::parse(locator_type)?;
    Ok(match kind {
        LocatorKind::Id => By::Id(locator.to_string()),
        LocatorKind::XPath => By::XPath(locator.to_string()),
        LocatorKind::LinkText => By::LinkText(locator.to_string()),
        LocatorKind::PartialLinkText => By::PartialLinkText(locator.to_string()),
        LocatorKind::Name => By::Name(locator.to_string()),
        LocatorKind::TagName => By::Tag(locator.to_string()),
        LocatorKind::ClassName => By::ClassName(locator.to_string()),
        LocatorKind::CssSelector => By::Css(locator.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_deserializes_from_tagged_yaml() {
        let yaml = "interaction_type: click\nlocator: \"#go\"\nlocator_type: id\n";
        let parsed: Interaction = serde_yaml::from_str(yaml).unwrap();
        match parsed {
            Interaction::Click { locator, wait_interval, .. } => {
                assert_eq!(locator, "#go");
                assert_eq!(wait_interval, 10);
            }
            _ => panic!("expected click variant"),
        }
    }

    #[test]
    fn dropdown_deserializes_from_tagged_yaml() {
        let yaml = "interaction_type: dropdown\nlocator: \"#sel\"\nlocator_type: id\noption_text: \"Yes\"\n";
        let parsed: Interaction = serde_yaml::from_str(yaml).unwrap();
        match parsed {
            Interaction::Dropdown { option_text, .. } => assert_eq!(option_text, "Yes"),
            _ => panic!("expected dropdown variant"),
        }
    }

    #[test]
    fn rejects_unknown_locator_kind() {
        assert!(to_by("x", "regex").is_err());
    }
}
