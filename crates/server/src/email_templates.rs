//! Email bodies for onboarding notifications.
//!
//! HTML bodies are Askama templates under `templates/`, so substituted values
//! are escaped on render. Plain-text alternatives are built inline.

use crate::notifications::{DueEvent, OutgoingEmail, Recipient};
use askama::Template;
use time::{Date, Month};

const SIGNATURE: &str = "Equipo de Onboarding";

/// Long-form Spanish date, e.g. `21 de octubre de 2026`.
pub fn format_date_es(date: Date) -> String {
    let month = match date.month() {
        Month::January => "enero",
        Month::February => "febrero",
        Month::March => "marzo",
        Month::April => "abril",
        Month::May => "mayo",
        Month::June => "junio",
        Month::July => "julio",
        Month::August => "agosto",
        Month::September => "septiembre",
        Month::October => "octubre",
        Month::November => "noviembre",
        Month::December => "diciembre",
    };
    format!("{} de {} de {}", date.day(), month, date.year())
}

/// Reminder sent by the scheduled run ahead of an event.
#[derive(Template)]
#[template(path = "weekly_alert.html")]
pub struct WeeklyAlertTemplate<'a> {
    pub recipient: &'a Recipient,
    pub event: &'a DueEvent,
}

impl WeeklyAlertTemplate<'_> {
    pub fn subject(&self) -> String {
        format!("Recordatorio: Onboarding - {}", self.event.name)
    }

    fn start_date(&self) -> String {
        format_date_es(self.event.start_date)
    }

    fn end_date(&self) -> String {
        format_date_es(self.event.end_date)
    }

    /// `None` for a missing or blank description.
    fn description(&self) -> Option<&str> {
        self.event
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
    }

    #[tracing::instrument(skip(self))]
    pub fn render_html(&self) -> Result<String, askama::Error> {
        self.render()
    }

    pub fn render_text(&self) -> String {
        let description = self
            .description()
            .map(|d| format!("Descripción: {d}\n"))
            .unwrap_or_default();

        format!(
            r#"Hola {},

Te recordamos que tienes programado un onboarding próximamente:

{}
Fecha de inicio: {}
Fecha de fin: {}
Tipo: {}
{}
Por favor, asegúrate de estar preparado para esta sesión.

Saludos,
{SIGNATURE}"#,
            self.recipient.full_name,
            self.event.name,
            self.start_date(),
            self.end_date(),
            self.event.kind,
            description,
        )
    }

    pub fn to_email(&self, from: &str) -> Result<OutgoingEmail, askama::Error> {
        Ok(OutgoingEmail {
            from: from.to_string(),
            to: self.recipient.email.clone(),
            subject: self.subject(),
            html_body: self.render_html()?,
            text_body: Some(self.render_text()),
        })
    }
}

/// Confirmation sent right after a collaborator is assigned to an event.
#[derive(Template)]
#[template(path = "assignment_confirmation.html")]
pub struct AssignmentConfirmationTemplate<'a> {
    pub recipient: &'a Recipient,
    pub event: &'a DueEvent,
}

impl AssignmentConfirmationTemplate<'_> {
    pub fn subject(&self) -> String {
        format!("Nueva asignación: {}", self.event.name)
    }

    fn start_date(&self) -> String {
        format_date_es(self.event.start_date)
    }

    fn end_date(&self) -> String {
        format_date_es(self.event.end_date)
    }

    #[tracing::instrument(skip(self))]
    pub fn render_html(&self) -> Result<String, askama::Error> {
        self.render()
    }

    pub fn render_text(&self) -> String {
        format!(
            "Hola {},\n\nSe te ha asignado el evento {} ({}).\nDel {} al {}.\n\nRecibirás un recordatorio unos días antes del inicio.\n\nSaludos,\n{SIGNATURE}",
            self.recipient.full_name,
            self.event.name,
            self.event.kind,
            self.start_date(),
            self.end_date(),
        )
    }

    pub fn to_email(&self, from: &str) -> Result<OutgoingEmail, askama::Error> {
        Ok(OutgoingEmail {
            from: from.to_string(),
            to: self.recipient.email.clone(),
            subject: self.subject(),
            html_body: self.render_html()?,
            text_body: Some(self.render_text()),
        })
    }
}

/// Operator probe confirming the mail path works end to end.
#[derive(Template)]
#[template(path = "test_email.html")]
pub struct TestEmailTemplate;

impl TestEmailTemplate {
    pub fn to_email(from: &str, to: &str) -> Result<OutgoingEmail, askama::Error> {
        Ok(OutgoingEmail {
            from: from.to_string(),
            to: to.to_string(),
            subject: "Prueba del Sistema de Notificaciones - Onboarding".to_string(),
            html_body: TestEmailTemplate.render()?,
            text_body: Some(
                "Este es un correo de prueba del sistema de gestión de onboarding.\n\
                 Si recibes este mensaje, el sistema de notificaciones está funcionando correctamente."
                    .to_string(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn fixtures() -> (Recipient, DueEvent) {
        (
            Recipient {
                collaborator_id: 1,
                full_name: "Ana <Admin> Pérez".into(),
                email: "ana@example.com".into(),
            },
            DueEvent {
                id: 7,
                name: "Onboarding Técnico & Seguridad".into(),
                kind: "technical".into(),
                description: Some("Traer portátil".into()),
                start_date: date!(2026 - 10 - 21),
                end_date: date!(2026 - 10 - 22),
            },
        )
    }

    #[test]
    fn spanish_dates() {
        assert_eq!(format_date_es(date!(2026 - 10 - 21)), "21 de octubre de 2026");
        assert_eq!(format_date_es(date!(2027 - 01 - 01)), "1 de enero de 2027");
    }

    #[test]
    fn weekly_alert_escapes_substituted_fields() {
        let (recipient, event) = fixtures();
        let template = WeeklyAlertTemplate {
            recipient: &recipient,
            event: &event,
        };
        let html = template.render_html().unwrap();
        assert!(html.contains("Ana &lt;Admin&gt; Pérez"));
        assert!(html.contains("Onboarding Técnico &amp; Seguridad"));
        assert!(html.contains("21 de octubre de 2026"));
        assert!(html.contains("Traer portátil"));
        assert!(!html.contains("<Admin>"));
    }

    #[test]
    fn weekly_alert_omits_empty_description() {
        let (recipient, mut event) = fixtures();
        event.description = Some("   ".into());
        let template = WeeklyAlertTemplate {
            recipient: &recipient,
            event: &event,
        };
        assert!(!template.render_html().unwrap().contains("Descripción"));
        assert!(!template.render_text().contains("Descripción"));
    }

    #[test]
    fn emails_are_addressed_to_the_recipient() {
        let (recipient, event) = fixtures();
        let email = AssignmentConfirmationTemplate {
            recipient: &recipient,
            event: &event,
        }
        .to_email("onboarding@example.com")
        .unwrap();
        assert_eq!(email.to, "ana@example.com");
        assert_eq!(email.from, "onboarding@example.com");
        assert!(email.subject.contains("Onboarding Técnico & Seguridad"));
        assert!(email.text_body.is_some());
    }

    #[test]
    fn test_email_has_no_footer() {
        let email = TestEmailTemplate::to_email("onboarding@example.com", "ops@example.com").unwrap();
        assert_eq!(email.to, "ops@example.com");
        assert!(email.html_body.contains("Sistema de Notificaciones Activo"));
        assert!(!email.html_body.contains("mensaje automático"));
    }
}
