// Urgent alert payload sanitization
use chrono::Utc;
use serde::Deserialize;

// The backend UI is Spanish; defaults follow its generic strings.
const DEFAULT_TITLE: &str = "Alerta UPS";
const DEFAULT_MESSAGE: &str = "Evento de UPS detectado";
const DEFAULT_ALERT_TYPE: &str = "warning";

/// Raw `urgent-alert` payload as it arrives over the channel. Every field is
/// optional at the boundary; sanitization happens at ingestion.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrgentAlertPayload {
    pub title: Option<String>,
    pub message: Option<String>,
    pub alert_type: Option<String>,
    pub created_at: Option<String>,
}

/// A sanitized alert, ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct UrgentAlert {
    pub title: String,
    pub message: String,
    pub alert_type: String,
    pub created_at: String,
}

impl From<UrgentAlertPayload> for UrgentAlert {
    fn from(payload: UrgentAlertPayload) -> Self {
        Self {
            title: payload.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            message: payload
                .message
                .unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            // Unrecognized types pass through verbatim; the queue does not
            // interpret them.
            alert_type: payload
                .alert_type
                .unwrap_or_else(|| DEFAULT_ALERT_TYPE.to_string()),
            created_at: payload.created_at.unwrap_or_else(|| Utc::now().to_rfc3339()),
        }
    }
}

impl UrgentAlert {
    /// Decode a channel payload, falling back to defaults for anything
    /// missing or malformed. Never rejects.
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value::<UrgentAlertPayload>(value)
            .unwrap_or_default()
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_payload_passes_through() {
        let alert = UrgentAlert::from_value(serde_json::json!({
            "title": "Fallo de energia",
            "message": "El UPS cambio a bateria",
            "alertType": "critical",
            "createdAt": "2026-08-26T10:15:00Z"
        }));
        assert_eq!(alert.title, "Fallo de energia");
        assert_eq!(alert.alert_type, "critical");
        assert_eq!(alert.created_at, "2026-08-26T10:15:00Z");
    }

    #[test]
    fn test_missing_fields_are_defaulted() {
        let alert = UrgentAlert::from_value(serde_json::json!({}));
        assert_eq!(alert.title, "Alerta UPS");
        assert_eq!(alert.message, "Evento de UPS detectado");
        assert_eq!(alert.alert_type, "warning");
        assert!(!alert.created_at.is_empty());
    }

    #[test]
    fn test_malformed_payload_is_defaulted_not_rejected() {
        let alert = UrgentAlert::from_value(serde_json::json!("not an object"));
        assert_eq!(alert.message, "Evento de UPS detectado");
    }

    #[test]
    fn test_unrecognized_alert_type_passes_verbatim() {
        let alert = UrgentAlert::from_value(serde_json::json!({ "alertType": "battery" }));
        assert_eq!(alert.alert_type, "battery");
    }
}
