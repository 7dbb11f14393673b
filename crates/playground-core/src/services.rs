//! Outbound HTTP collaborators: SSO exchange, video metadata, mail, SMS.
//!
//! Each collaborator is a narrow trait so handlers can be tested with
//! in-process fakes. The production implementations talk HTTP via
//! `reqwest`. A collaborator whose credentials are absent is replaced by
//! [`Disabled`], which fails every call with
//! [`ServiceError::NotConfigured`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use minijinja::{Environment, context};
use serde::Deserialize;

use crate::config::{Secrets, Settings};

/// Upper bound on any one outbound HTTP request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from outbound collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote side answered with a non-success status.
    #[error("remote returned {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, for the log.
        body: String,
    },

    /// The response did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The collaborator has no credentials.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// A message template failed to render.
    #[error("template error: {0}")]
    Template(String),
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// What the SSO provider knows about an applicant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsoProfile {
    /// Provider-side account id.
    pub id: String,
    /// Account email.
    pub email: String,
    /// Full name.
    pub name: String,
    /// School name.
    pub school: String,
    /// Expected graduation year, 0 when unknown.
    pub grad_year: i32,
    /// Whether the applicant is past high school.
    pub is_college: bool,
    /// Whether the applicant was admitted.
    pub admitted: bool,
    /// Whether the applicant confirmed attendance.
    pub confirmed: bool,
}

/// Exchanges a single sign-on token for an applicant profile.
#[async_trait]
pub trait SsoExchange: Send + Sync {
    /// Redeem `token`.
    async fn exchange(&self, token: &str) -> Result<SsoProfile, ServiceError>;
}

/// Metadata about a video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoInfo {
    /// Video title.
    pub title: String,
    /// Small thumbnail image.
    pub thumbnail_url: String,
    /// Length in seconds.
    pub duration_secs: u32,
}

/// Looks up video titles and durations.
#[async_trait]
pub trait VideoLookup: Send + Sync {
    /// Fetch metadata for the video with code `vid_code`.
    async fn lookup(&self, vid_code: &str) -> Result<VideoInfo, ServiceError>;
}

/// Sends login code emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Mail `code` to `email`. `audience` names the kind of account
    /// ("sponsor", "mentor", "organizer").
    async fn send_login_code(&self, email: &str, code: u32, audience: &str)
    -> Result<(), ServiceError>;
}

/// Sends text messages.
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Text `body` to the North American number `phone`.
    async fn send(&self, phone: &str, body: &str) -> Result<(), ServiceError>;
}

/// The collaborators a [`Context`](crate::context::Context) hands to
/// handlers.
#[derive(Clone)]
pub struct Services {
    /// SSO token exchange.
    pub sso: Arc<dyn SsoExchange>,
    /// Video metadata.
    pub video: Arc<dyn VideoLookup>,
    /// Login code mail.
    pub mailer: Arc<dyn Mailer>,
    /// Queue notification texts.
    pub sms: Arc<dyn SmsSender>,
}

impl Services {
    /// Build the HTTP collaborators, disabling any without credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Template`] if the mail template is invalid,
    /// or [`ServiceError::Http`] if the HTTP client cannot be built.
    pub fn from_settings(settings: &Settings, secrets: &Secrets) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        let sso: Arc<dyn SsoExchange> = Arc::new(HttpSso {
            client: client.clone(),
            base_url: settings.auth.sso_url.clone(),
        });

        let video: Arc<dyn VideoLookup> = match &secrets.youtube_api_key {
            Some(key) => Arc::new(YouTubeLookup {
                client: client.clone(),
                api_base: settings.video.api_base.clone(),
                api_key: key.clone(),
            }),
            None => {
                tracing::warn!("YOUTUBE_API_KEY unset; song submissions will fail");
                Arc::new(Disabled)
            }
        };

        let mailer: Arc<dyn Mailer> = if settings.mail.endpoint.is_empty() {
            tracing::warn!("mail.endpoint unset; login codes will not be mailed");
            Arc::new(Disabled)
        } else {
            Arc::new(HttpMailer::new(
                client.clone(),
                settings.mail.endpoint.clone(),
                settings.mail.from.clone(),
                settings.mail.subject.clone(),
                secrets.mail_api_key.clone(),
            )?)
        };

        let sms: Arc<dyn SmsSender> = match (
            &secrets.twilio_account_sid,
            &secrets.twilio_auth_token,
            settings.sms.from.is_empty(),
        ) {
            (Some(sid), Some(token), false) => Arc::new(TwilioSms {
                client,
                api_base: settings.sms.api_base.clone(),
                account_sid: sid.clone(),
                auth_token: token.clone(),
                from: settings.sms.from.clone(),
            }),
            _ => {
                tracing::warn!("SMS credentials unset; queue texts disabled");
                Arc::new(Disabled)
            }
        };

        Ok(Self {
            sso,
            video,
            mailer,
            sms,
        })
    }

    /// Every collaborator disabled.
    pub fn disabled() -> Self {
        Self {
            sso: Arc::new(Disabled),
            video: Arc::new(Disabled),
            mailer: Arc::new(Disabled),
            sms: Arc::new(Disabled),
        }
    }
}

// ---------------------------------------------------------------------------
// Disabled collaborator
// ---------------------------------------------------------------------------

/// Stand-in for a collaborator without credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

#[async_trait]
impl SsoExchange for Disabled {
    async fn exchange(&self, _token: &str) -> Result<SsoProfile, ServiceError> {
        Err(ServiceError::NotConfigured("sso"))
    }
}

#[async_trait]
impl VideoLookup for Disabled {
    async fn lookup(&self, _vid_code: &str) -> Result<VideoInfo, ServiceError> {
        Err(ServiceError::NotConfigured("video lookup"))
    }
}

#[async_trait]
impl Mailer for Disabled {
    async fn send_login_code(&self, _email: &str, _code: u32, _audience: &str) -> Result<(), ServiceError> {
        Err(ServiceError::NotConfigured("mail"))
    }
}

#[async_trait]
impl SmsSender for Disabled {
    async fn send(&self, _phone: &str, _body: &str) -> Result<(), ServiceError> {
        Err(ServiceError::NotConfigured("sms"))
    }
}

// ---------------------------------------------------------------------------
// SSO
// ---------------------------------------------------------------------------

/// SSO exchange over HTTP: `POST {base}/auth/sso/exchange`.
pub struct HttpSso {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SsoResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    profile: SsoResponseProfile,
    #[serde(default)]
    status: SsoResponseStatus,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SsoResponseProfile {
    name: String,
    school: String,
    graduation_year: String,
    school_level: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct SsoResponseStatus {
    admitted: bool,
    confirmed: bool,
}

impl From<SsoResponse> for SsoProfile {
    fn from(response: SsoResponse) -> Self {
        Self {
            id: response.id,
            email: response.email,
            name: response.profile.name,
            school: response.profile.school,
            grad_year: response.profile.graduation_year.trim().parse().unwrap_or(0),
            is_college: response.profile.school_level != "high",
            admitted: response.status.admitted,
            confirmed: response.status.confirmed,
        }
    }
}

#[async_trait]
impl SsoExchange for HttpSso {
    async fn exchange(&self, token: &str) -> Result<SsoProfile, ServiceError> {
        let url = format!("{}/auth/sso/exchange", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await?;
        let response: SsoResponse = checked(response).await?.json().await?;
        if response.id.is_empty() {
            return Err(ServiceError::Malformed("SSO response has no id".to_owned()));
        }
        Ok(response.into())
    }
}

// ---------------------------------------------------------------------------
// Video metadata
// ---------------------------------------------------------------------------

/// Video metadata from the `YouTube` Data API.
pub struct YouTubeLookup {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

#[async_trait]
impl VideoLookup for YouTubeLookup {
    async fn lookup(&self, vid_code: &str) -> Result<VideoInfo, ServiceError> {
        let url = format!("{}/videos", self.api_base.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("part", "snippet,contentDetails"),
                ("id", vid_code),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;
        let json: serde_json::Value = checked(response).await?.json().await?;
        extract_video_info(&json)
    }
}

/// Pull title, thumbnail and duration out of a `videos.list` response.
fn extract_video_info(json: &serde_json::Value) -> Result<VideoInfo, ServiceError> {
    let video = json
        .get("items")
        .and_then(|items| items.get(0))
        .ok_or_else(|| ServiceError::Malformed("no such video".to_owned()))?;
    let snippet = video.get("snippet");

    let title = snippet
        .and_then(|s| s.get("title"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let thumbnail_url = snippet
        .and_then(|s| s.pointer("/thumbnails/default/url"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let duration = video
        .pointer("/contentDetails/duration")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ServiceError::Malformed("video has no duration".to_owned()))?;
    let duration_secs = parse_iso8601_duration(duration)
        .ok_or_else(|| ServiceError::Malformed(format!("bad duration {duration}")))?;

    Ok(VideoInfo {
        title,
        thumbnail_url,
        duration_secs,
    })
}

/// Parse an ISO 8601 duration such as `PT4M13S` or `P1DT2H` into seconds.
///
/// Years, months and weeks are not accepted.
pub fn parse_iso8601_duration(raw: &str) -> Option<u32> {
    let rest = raw.strip_prefix('P')?;
    let mut total: u32 = 0;
    let mut digits = String::new();
    let mut in_time = false;

    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'T' if digits.is_empty() && !in_time => in_time = true,
            'D' | 'H' | 'M' | 'S' => {
                let value: u32 = digits.parse().ok()?;
                digits.clear();
                let unit = match (c, in_time) {
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                total = total.checked_add(value.checked_mul(unit)?)?;
            }
            _ => return None,
        }
    }

    digits.is_empty().then_some(total)
}

// ---------------------------------------------------------------------------
// Mail
// ---------------------------------------------------------------------------

const LOGIN_CODE_TEMPLATE: &str = "\
Hi there {{ audience }}!

Your Playground login code is {{ code }}.

Enter it on the login screen to get started. If you did not ask for a code,
you can ignore this email.
";

/// Mail delivery through a JSON HTTP API.
///
/// The body is rendered from a `minijinja` template.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    from: String,
    subject: String,
    api_key: Option<String>,
    env: Environment<'static>,
}

impl HttpMailer {
    /// Create a mailer posting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Template`] if the built-in template does not
    /// compile.
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        from: String,
        subject: String,
        api_key: Option<String>,
    ) -> Result<Self, ServiceError> {
        let mut env = Environment::new();
        env.add_template_owned("login_code", LOGIN_CODE_TEMPLATE.to_owned())
            .map_err(|e| ServiceError::Template(format!("failed to add login_code template: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            from,
            subject,
            api_key,
            env,
        })
    }

    /// Render the login code body.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Template`] if rendering fails.
    pub fn render_login_code(&self, code: u32, audience: &str) -> Result<String, ServiceError> {
        self.env
            .get_template("login_code")
            .map_err(|e| ServiceError::Template(format!("missing login_code template: {e}")))?
            .render(context! { code => format!("{code:06}"), audience => audience })
            .map_err(|e| ServiceError::Template(format!("login_code render failed: {e}")))
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_login_code(&self, email: &str, code: u32, audience: &str) -> Result<(), ServiceError> {
        let body = serde_json::json!({
            "from": self.from,
            "to": email,
            "subject": self.subject,
            "text": self.render_login_code(code, audience)?,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        checked(request.send().await?).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SMS
// ---------------------------------------------------------------------------

/// Text messages through the Twilio REST API.
pub struct TwilioSms {
    client: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from: String,
}

#[async_trait]
impl SmsSender for TwilioSms {
    async fn send(&self, phone: &str, body: &str) -> Result<(), ServiceError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.account_sid
        );
        let to = normalize_phone(phone);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .header("Accept", "application/json")
            .form(&[("To", to.as_str()), ("From", self.from.as_str()), ("Body", body)])
            .send()
            .await?;
        checked(response).await?;
        Ok(())
    }
}

/// `+1` followed by the digits of `raw`.
pub fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    format!("+1{digits}")
}

/// Turn a non-success status into [`ServiceError::Rejected`].
async fn checked(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error body".to_owned());
    Err(ServiceError::Rejected {
        status: status.as_u16(),
        body,
    })
}
