use std::sync::Arc;

use chrono::Utc;

use crate::account::*;
use crate::crypto;
use crate::error::Result;
use crate::mail::Notifier;
use crate::template::{self, TemplateRenderer, Variables};

/// Subject of the activation email.
pub const ACTIVATION_SUBJECT: &str = "Activate your account";

/// Where activation links point to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivationLink {
    /// Scheme and host, e.g. `http://localhost:8080`.
    pub domain: String,
    /// Base path the application is served under, e.g. `/community`.
    pub context_path: String,
}

impl ActivationLink {
    /// Create a new [`ActivationLink`].
    pub fn new(domain: impl Into<String>, context_path: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            context_path: context_path.into(),
        }
    }

    /// Link mailed to the owner of account `id`.
    pub fn url(&self, id: i64, code: &str) -> String {
        format!(
            "{}{}/activation/{id}/{code}",
            self.domain, self.context_path
        )
    }
}

/// Account manager.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    templates: Arc<dyn TemplateRenderer>,
    link: ActivationLink,
}

impl AccountService {
    /// Create a new [`AccountService`].
    pub fn new(
        store: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
        templates: Arc<dyn TemplateRenderer>,
        link: ActivationLink,
    ) -> Self {
        Self {
            store,
            notifier,
            templates,
            link,
        }
    }

    /// Find an account using its `id`.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Account>> {
        self.store.select_by_id(id).await
    }

    /// Register a new pending account and mail its activation link.
    ///
    /// Checks stop at the first failing field, whose message is returned.
    /// An empty [`ValidationResult`] means the account was created.
    pub async fn register(
        &self,
        candidate: Candidate,
    ) -> Result<ValidationResult> {
        if is_blank(&candidate.username) {
            return Ok(ValidationResult::field(
                USERNAME_FIELD,
                USERNAME_REQUIRED,
            ));
        }
        if is_blank(&candidate.password) {
            return Ok(ValidationResult::field(
                PASSWORD_FIELD,
                PASSWORD_REQUIRED,
            ));
        }
        if is_blank(&candidate.email) {
            return Ok(ValidationResult::field(EMAIL_FIELD, EMAIL_REQUIRED));
        }

        if self
            .store
            .select_by_username(&candidate.username)
            .await?
            .is_some()
        {
            return Ok(ValidationResult::field(USERNAME_FIELD, USERNAME_TAKEN));
        }
        if self.store.select_by_email(&candidate.email).await?.is_some() {
            return Ok(ValidationResult::field(EMAIL_FIELD, EMAIL_TAKEN));
        }

        let salt = crypto::generate_salt();
        let mut account = Account {
            id: 0,
            password: crypto::digest_password(&candidate.password, &salt),
            salt,
            username: candidate.username,
            email: candidate.email,
            account_type: AccountType::Ordinary,
            status: AccountStatus::Pending,
            activation_code: crypto::generate_activation_code(),
            avatar_url: crypto::random_avatar_url(),
            created_at: Utc::now(),
        };
        account.id = self.store.insert(&account).await?;

        let url = self.link.url(account.id, &account.activation_code);
        let variables =
            Variables::from([("email", account.email.clone()), ("url", url)]);
        let body = self.templates.render(template::ACTIVATION, &variables)?;
        self.notifier
            .send(&account.email, ACTIVATION_SUBJECT, &body)
            .await?;

        tracing::info!(user_id = account.id, "account registered");
        metrics::counter!("accounts_registered_total").increment(1);

        Ok(ValidationResult::default())
    }

    /// Activate account `user_id` if `code` matches its activation code.
    pub async fn activate(
        &self,
        user_id: i64,
        code: &str,
    ) -> Result<ActivationOutcome> {
        let outcome = match self.store.select_by_id(user_id).await? {
            None => ActivationOutcome::NotFound,
            Some(account) if account.is_active() => {
                ActivationOutcome::AlreadyActive
            },
            Some(account) if account.activation_code == code => {
                self.store
                    .update_status(user_id, AccountStatus::Active)
                    .await?;
                ActivationOutcome::Success
            },
            Some(_) => ActivationOutcome::Failure,
        };

        tracing::info!(user_id, outcome = outcome.as_str(), "activation");
        metrics::counter!("accounts_activation_total", "outcome" => outcome.as_str())
            .increment(1);

        Ok(outcome)
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
