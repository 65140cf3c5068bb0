//! Narrow browser-automation surface.
//!
//! The extraction flow only ever talks to a [`PageDriver`], so the poller,
//! resolver and extractor can be exercised against an in-memory fake without
//! spawning Chrome. The real implementation wraps one `headless_chrome` tab.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use headless_chrome::{Element, Tab};
use serde_json::Value;

/// How to find an element on the page.
///
/// The Coveo widgets on the target site carry unstable ids and classes, so
/// strategies mix structural XPath with attribute/role CSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    Css(&'static str),
    XPath(&'static str),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{}", s),
            Locator::XPath(s) => write!(f, "xpath:{}", s),
        }
    }
}

/// Capability surface the engine needs from a browser tab.
pub trait PageDriver: Send + Sync {
    fn navigate(&self, url: &str) -> Result<()>;

    fn title(&self) -> Result<String>;

    /// Number of elements currently matching `locator`. Driver errors count
    /// as zero matches; strategy selection treats both the same way.
    fn query_count(&self, locator: &Locator) -> usize;

    /// Evaluate a script in the page and return its value, `Null` if the
    /// script produced none.
    fn evaluate(&self, script: &str) -> Result<Value>;

    /// Rendered HTML of the current document.
    fn content(&self) -> Result<String>;

    fn click(&self, locator: &Locator) -> Result<()>;

    /// Focus the element and empty its value.
    fn clear(&self, locator: &Locator) -> Result<()>;

    /// Focus the element and type `text` into it.
    fn send_keys(&self, locator: &Locator, text: &str) -> Result<()>;

    /// Simulated Enter keypress on the focused element.
    fn press_enter(&self) -> Result<()>;
}

/// [`PageDriver`] backed by one headless-Chrome tab.
pub struct ChromeTabDriver {
    tab: Arc<Tab>,
}

impl ChromeTabDriver {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    fn find(&self, locator: &Locator) -> Result<Element<'_>> {
        match locator {
            Locator::Css(sel) => self.tab.find_element(sel),
            Locator::XPath(query) => self.tab.find_element_by_xpath(query),
        }
    }
}

impl PageDriver for ChromeTabDriver {
    fn navigate(&self, url: &str) -> Result<()> {
        self.tab.navigate_to(url)?;
        self.tab.wait_until_navigated()?;
        Ok(())
    }

    fn title(&self) -> Result<String> {
        self.tab.get_title()
    }

    fn query_count(&self, locator: &Locator) -> usize {
        let found = match locator {
            Locator::Css(sel) => self.tab.find_elements(sel),
            Locator::XPath(query) => self.tab.find_elements_by_xpath(query),
        };
        found.map(|els| els.len()).unwrap_or(0)
    }

    fn evaluate(&self, script: &str) -> Result<Value> {
        let object = self.tab.evaluate(script, true)?;
        Ok(object.value.unwrap_or(Value::Null))
    }

    fn content(&self) -> Result<String> {
        self.tab.get_content()
    }

    fn click(&self, locator: &Locator) -> Result<()> {
        self.find(locator)?.click()?;
        Ok(())
    }

    fn clear(&self, locator: &Locator) -> Result<()> {
        self.find(locator)?.call_js_fn(
            "function() { this.focus(); this.value = ''; }",
            vec![],
            false,
        )?;
        Ok(())
    }

    fn send_keys(&self, locator: &Locator, text: &str) -> Result<()> {
        // Click to focus; type_str targets the focused element.
        self.find(locator)?.click()?;
        self.tab.type_str(text)?;
        Ok(())
    }

    fn press_enter(&self) -> Result<()> {
        self.tab.press_key("Enter")?;
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// In-memory [`PageDriver`] scripted per test.
    #[derive(Default)]
    pub struct MockDriver {
        /// Successive values returned by `title()`; the last one repeats.
        pub titles: Mutex<Vec<String>>,
        /// Match counts keyed by `Locator` display form.
        pub counts: Mutex<HashMap<String, usize>>,
        /// Evaluation results keyed by exact script text.
        pub eval_results: Mutex<HashMap<String, Value>>,
        pub page_content: Mutex<String>,
        /// Every driver interaction, in order.
        pub log: Mutex<Vec<String>>,
    }

    impl MockDriver {
        pub fn with_counts(counts: &[(&Locator, usize)]) -> Self {
            let driver = Self::default();
            {
                let mut map = driver.counts.lock().unwrap();
                for (locator, count) in counts {
                    map.insert(locator.to_string(), *count);
                }
            }
            driver
        }

        pub fn set_eval(&self, script: &str, value: Value) {
            self.eval_results
                .lock()
                .unwrap()
                .insert(script.to_string(), value);
        }

        pub fn calls(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.log.lock().unwrap().push(call);
        }
    }

    impl PageDriver for MockDriver {
        fn navigate(&self, url: &str) -> Result<()> {
            self.record(format!("navigate:{url}"));
            Ok(())
        }

        fn title(&self) -> Result<String> {
            self.record("title".to_string());
            let mut titles = self.titles.lock().unwrap();
            if titles.len() > 1 {
                Ok(titles.remove(0))
            } else {
                Ok(titles.first().cloned().unwrap_or_default())
            }
        }

        fn query_count(&self, locator: &Locator) -> usize {
            self.record(format!("query_count:{locator}"));
            self.counts
                .lock()
                .unwrap()
                .get(&locator.to_string())
                .copied()
                .unwrap_or(0)
        }

        fn evaluate(&self, script: &str) -> Result<Value> {
            self.record("evaluate".to_string());
            Ok(self
                .eval_results
                .lock()
                .unwrap()
                .get(script)
                .cloned()
                .unwrap_or(Value::Null))
        }

        fn content(&self) -> Result<String> {
            self.record("content".to_string());
            Ok(self.page_content.lock().unwrap().clone())
        }

        fn click(&self, locator: &Locator) -> Result<()> {
            self.record(format!("click:{locator}"));
            Ok(())
        }

        fn clear(&self, locator: &Locator) -> Result<()> {
            self.record(format!("clear:{locator}"));
            Ok(())
        }

        fn send_keys(&self, locator: &Locator, text: &str) -> Result<()> {
            self.record(format!("send_keys:{locator}:{text}"));
            Ok(())
        }

        fn press_enter(&self) -> Result<()> {
            self.record("press_enter".to_string());
            Ok(())
        }
    }
}
