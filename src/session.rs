//! Browser session lifecycle.
//!
//! One extraction request owns one Chrome process (and, on display-less
//! hosts, one Xvfb process). Both are torn down by `Drop`, so every exit
//! path — success, error, panic, deadline expiry — releases them.

use std::ffi::OsStr;
use std::process::{Child, Command};
use std::time::Duration;

use headless_chrome::{Browser, LaunchOptions};
use tracing::{info, warn};

use crate::driver::ChromeTabDriver;
use crate::error::ScrapeError;
use crate::poll::Deadline;
use crate::stealth;

/// Immutable parameters for one browser session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The site serves the challenge far more aggressively to headless
    /// Chrome, so the default is a headed browser on a virtual display.
    pub headless: bool,
    pub user_agent: String,
    /// Inject the fingerprint-hardening script before navigation.
    pub harden_fingerprint: bool,
    pub target_url: String,
    /// Overall request deadline, fixed at session open.
    pub overall_timeout: Duration,
}

impl SessionConfig {
    pub fn for_store_lookup() -> Self {
        let headless = std::env::var("HEADLESS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            headless,
            user_agent: stealth::pick_user_agent().to_string(),
            harden_fingerprint: true,
            target_url: "https://www.abc.virginia.gov/stores".to_string(),
            overall_timeout: Duration::from_secs(60),
        }
    }
}

/// Keeps an Xvfb process alive for the lifetime of one session.
pub struct XvfbGuard {
    child: Child,
}

impl Drop for XvfbGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Start Xvfb on `:99` if the host advertises no display.
///
/// Returns `None` both when a display already exists and when Xvfb cannot be
/// started — the latter is logged and the session proceeds best-effort, since
/// some hosts have a usable display that `DISPLAY` checks miss.
fn provision_display() -> Option<XvfbGuard> {
    let has_display = std::env::var("DISPLAY")
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    if has_display {
        return None;
    }

    std::env::set_var("DISPLAY", ":99");
    match Command::new("Xvfb")
        .args([":99", "-screen", "0", "1920x1080x24"])
        .spawn()
    {
        Ok(child) => {
            // Give the X server a moment to accept connections.
            std::thread::sleep(Duration::from_secs(2));
            info!("virtual display started on :99");
            Some(XvfbGuard { child })
        }
        Err(e) => {
            warn!("could not start Xvfb: {e}; attempting to run without a virtual display");
            None
        }
    }
}

/// One launched Chrome with a single tab attached.
pub struct BrowserSession {
    driver: ChromeTabDriver,
    deadline: Deadline,
    // Held for their Drop side effects: dropping the browser kills the
    // Chrome process, dropping the guard kills Xvfb.
    _browser: Browser,
    _display: Option<XvfbGuard>,
}

impl BrowserSession {
    /// Launch Chrome with the session flags. Launch failure is fatal for the
    /// request; display provisioning failure is not.
    pub fn open(config: &SessionConfig) -> Result<Self, ScrapeError> {
        let display = provision_display();
        let deadline = Deadline::after(config.overall_timeout);

        let ua_arg = format!("--user-agent={}", config.user_agent);
        let mut args = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--exclude-switches=enable-automation"),
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-infobars"),
            OsStr::new("--window-position=0,0"),
        ];
        args.push(OsStr::new(&ua_arg));
        if config.headless {
            args.push(OsStr::new("--headless=new"));
        }

        let browser = Browser::new(LaunchOptions {
            // Modern headless is requested via args; the launcher flag would
            // select the legacy mode.
            headless: false,
            window_size: Some((1920, 1080)),
            idle_browser_timeout: config.overall_timeout,
            args,
            ..Default::default()
        })
        .map_err(ScrapeError::SessionLaunch)?;

        let tab = browser.new_tab().map_err(ScrapeError::SessionLaunch)?;

        if config.harden_fingerprint {
            let injected = tab.call_method(
                headless_chrome::protocol::cdp::Page::AddScriptToEvaluateOnNewDocument {
                    source: stealth::stealth_script(),
                    world_name: None,
                    include_command_line_api: None,
                    run_immediately: None,
                },
            );
            if let Err(e) = injected {
                warn!("fingerprint hardening injection failed: {e}");
            }
        }

        Ok(Self {
            driver: ChromeTabDriver::new(tab),
            deadline,
            _browser: browser,
            _display: display,
        })
    }

    pub fn driver(&self) -> &ChromeTabDriver {
        &self.driver
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }
}
