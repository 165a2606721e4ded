//! Outbound email: invitation links and address-verification links.
//!
//! `EmailProvider` is the seam the handlers depend on; production wires the
//! SMTP transport, tests wire the mock. Sending happens on the blocking pool
//! since lettre's sync transport would otherwise stall the runtime.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use service_core::error::AppError;
use std::time::Duration;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_invitation_email(
        &self,
        to_email: &str,
        org_name: &str,
        role: &str,
        invite_token: &str,
        base_url: &str,
    ) -> Result<(), AppError>;

    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl EmailService {
    pub fn new(config: &crate::config::SmtpConfig) -> Result<Self, AppError> {
        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
            .credentials(Credentials::new(config.user.clone(), config.password.clone()))
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.user.clone(),
        })
    }

    async fn deliver(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: String,
        html_body: String,
    ) -> Result<(), AppError> {
        let parse_addr = |addr: &str| {
            addr.parse()
                .map_err(|e: lettre::address::AddressError| AppError::InternalError(e.into()))
        };

        let message = Message::builder()
            .from(parse_addr(&self.from_email)?)
            .to(parse_addr(to_email)?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| AppError::InternalError(e.into()))?;

        let mailer = self.mailer.clone();
        let sent = tokio::task::spawn_blocking(move || mailer.send(&message))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match sent {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Email delivery failed");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

fn button_html(heading: &str, intro: &str, link: &str, label: &str, footer: &str) -> String {
    format!(
        "<html><body style=\"font-family: Arial, sans-serif;\">\
         <h2>{heading}</h2>\
         <p>{intro}</p>\
         <p><a href=\"{link}\" style=\"background-color: #4CAF50; color: white; \
         padding: 14px 20px; text-decoration: none; border-radius: 4px;\">{label}</a></p>\
         <p style=\"color: #666; font-size: 12px;\">{footer}</p>\
         </body></html>"
    )
}

#[async_trait]
impl EmailProvider for EmailService {
    async fn send_invitation_email(
        &self,
        to_email: &str,
        org_name: &str,
        role: &str,
        invite_token: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        let join_link = format!("{}/join?token={}", base_url, invite_token);
        let footer =
            "This invitation is personal and expires. If you weren't expecting it, please \
             ignore this email.";

        let html = button_html(
            &format!("You have been invited to join {org_name}"),
            &format!(
                "You have been invited to join <strong>{org_name}</strong> as \
                 <strong>{role}</strong>. Click the link below to accept:"
            ),
            &join_link,
            &format!("Join {org_name}"),
            footer,
        );
        let plain = format!(
            "You have been invited to join {org_name} as {role}.\n\n\
             Accept the invitation by visiting:\n\n{join_link}\n\n{footer}"
        );

        self.deliver(
            to_email,
            &format!("Invitation to join {}", org_name),
            plain,
            html,
        )
        .await
    }

    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        let verification_link = format!("{}/auth/verify?token={}", base_url, verification_token);
        let footer =
            "This link will expire in 24 hours. If you didn't request this, please ignore \
             this email.";

        let html = button_html(
            "Welcome! Please verify your email",
            "Thank you for registering. Please click the link below to verify your email \
             address:",
            &verification_link,
            "Verify Email",
            footer,
        );
        let plain = format!(
            "Welcome! Please verify your email.\n\n\
             Thank you for registering. Please visit the following link to verify your \
             email address:\n\n{verification_link}\n\n{footer}"
        );

        self.deliver(to_email, "Verify Your Email Address", plain, html)
            .await
    }
}

/// Drops every message; used by the test harness.
#[derive(Clone)]
pub struct MockEmailService;

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_invitation_email(
        &self,
        _to_email: &str,
        _org_name: &str,
        _role: &str,
        _invite_token: &str,
        _base_url: &str,
    ) -> Result<(), AppError> {
        Ok(())
    }

    async fn send_verification_email(
        &self,
        _to_email: &str,
        _verification_token: &str,
        _base_url: &str,
    ) -> Result<(), AppError> {
        Ok(())
    }
}
