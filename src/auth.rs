// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Platform login. Performed once per run; a failure here is systemic and
//! aborts the run rather than being retried per course.

use std::time::Duration;

use async_trait::async_trait;
use log::info;

use crate::browser::BrowserPage;
use crate::error::{AuthError, BrowserError};
use crate::queue::PLATFORM_DOMAIN;

/// Login credentials, held in memory only for the duration of a run
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, page: &dyn BrowserPage, credentials: &Credentials)
    -> Result<(), AuthError>;
}

const EMAIL_SELECTOR: &str = "input[name='email']";
const PASSWORD_SELECTOR: &str = "input[name='password']";
const SUBMIT_SELECTOR: &str = "button[type='submit']";
const LOGGED_IN_SELECTOR: &str = "a[href*='/app/dashboard']";
const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Form-based login against the platform's login page
pub struct FormAuthenticator {
    login_url: String,
}

impl Default for FormAuthenticator {
    fn default() -> Self {
        Self {
            login_url: format!("https://www.{PLATFORM_DOMAIN}/login"),
        }
    }
}

#[async_trait]
impl Authenticator for FormAuthenticator {
    async fn login(
        &self,
        page: &dyn BrowserPage,
        credentials: &Credentials,
    ) -> Result<(), AuthError> {
        info!("logging in as {}", credentials.email);
        page.goto(&self.login_url).await?;
        page.fill(EMAIL_SELECTOR, &credentials.email).await?;
        page.fill(PASSWORD_SELECTOR, &credentials.password).await?;
        page.click(SUBMIT_SELECTOR).await?;

        match page.wait_for(LOGGED_IN_SELECTOR, LOGIN_TIMEOUT).await {
            Ok(()) => {
                info!("login succeeded");
                Ok(())
            }
            Err(BrowserError::WaitTimeout { .. }) => Err(AuthError::LoginFailed {
                reason: "dashboard never appeared; check email and password".to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedPage {
        actions: Mutex<Vec<String>>,
        wait_times_out: bool,
    }

    #[async_trait]
    impl BrowserPage for ScriptedPage {
        async fn goto(&self, url: &str) -> Result<(), BrowserError> {
            self.actions.lock().unwrap().push(format!("goto {url}"));
            Ok(())
        }

        async fn content(&self) -> Result<String, BrowserError> {
            Ok(String::new())
        }

        async fn fill(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
            self.actions
                .lock()
                .unwrap()
                .push(format!("fill {selector} {text}"));
            Ok(())
        }

        async fn click(&self, selector: &str) -> Result<(), BrowserError> {
            self.actions.lock().unwrap().push(format!("click {selector}"));
            Ok(())
        }

        async fn wait_for(
            &self,
            selector: &str,
            timeout: Duration,
        ) -> Result<(), BrowserError> {
            if self.wait_times_out {
                Err(BrowserError::WaitTimeout {
                    selector: selector.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            } else {
                Ok(())
            }
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            email: "user@example.com".to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[tokio::test]
    async fn login_drives_the_form_in_order() {
        let page = ScriptedPage::default();
        let auth = FormAuthenticator::default();

        auth.login(&page, &credentials()).await.unwrap();

        let actions = page.actions.lock().unwrap();
        assert_eq!(actions.len(), 4);
        assert!(actions[0].starts_with("goto https://www.estrategiaconcursos.com.br/login"));
        assert!(actions[1].contains("email"));
        assert!(actions[2].contains("password"));
        assert!(actions[3].starts_with("click"));
    }

    #[tokio::test]
    async fn timeout_reports_login_failure() {
        let page = ScriptedPage {
            wait_times_out: true,
            ..Default::default()
        };
        let auth = FormAuthenticator::default();

        let result = auth.login(&page, &credentials()).await;
        assert!(matches!(result, Err(AuthError::LoginFailed { .. })));
    }
}
