//! Browser fingerprint hardening.
//!
//! The store pages sit behind a Cloudflare interstitial that fingerprints the
//! browser before releasing real content. Launch flags alone leave
//! `navigator.webdriver` and the missing `window.chrome` object visible, so a
//! script injected via `Page.addScriptToEvaluateOnNewDocument` patches the
//! obvious tells before any page script runs. This does not try to beat every
//! measure the vendor ships; it keeps an ordinary headed Chrome looking
//! ordinary.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    ]
});

/// Pick a desktop Chrome user agent for one session.
pub fn pick_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
}

/// Script injected before every document in the session.
pub fn stealth_script() -> String {
    let script = r#"
        // Remove the automation flag the interstitial checks first.
        Object.defineProperty(navigator, 'webdriver', {
            get: () => undefined,
        });

        // Headed Chrome always exposes window.chrome; a bare object is enough
        // for the interstitial's presence check.
        if (!window.chrome) {
            window.chrome = {
                runtime: {},
                app: { isInstalled: false },
                csi: function() {},
                loadTimes: function() { return {}; },
            };
        }

        // Notification permission query must mirror Notification.permission
        // instead of always answering 'prompt'.
        const originalQuery = window.navigator.permissions.query;
        window.navigator.permissions.query = (parameters) => (
            parameters.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : originalQuery(parameters)
        );

        // Empty plugin lists are a headless giveaway.
        Object.defineProperty(navigator, 'plugins', {
            get: () => {
                const pdf = {
                    description: "Portable Document Format",
                    filename: "internal-pdf-viewer",
                    length: 1,
                    name: "Chrome PDF Plugin"
                };
                const p = [pdf, pdf, pdf];
                Object.setPrototypeOf(p, PluginArray.prototype);
                return p;
            }
        });

        Object.defineProperty(navigator, 'languages', {
            get: () => ['en-US', 'en'],
        });
    "#;

    script.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_patches_the_known_tells() {
        let script = stealth_script();
        assert!(script.contains("Object.defineProperty(navigator, 'webdriver'"));
        assert!(script.contains("window.chrome"));
        assert!(script.contains("navigator.permissions.query"));
    }

    #[test]
    fn user_agent_is_desktop_chrome() {
        let ua = pick_user_agent();
        assert!(ua.contains("Chrome/"));
        assert!(!ua.contains("Mobile"));
    }
}
