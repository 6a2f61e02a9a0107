//! Unit tests for enqueue validation

#[cfg(test)]
mod tests {
    use super::super::enqueue::*;
    use serde_json::json;

    fn valid() -> EnqueueEmailRequest {
        EnqueueEmailRequest::new(
            "client@example.com",
            "Invoice INV-0042 is overdue",
            "Hello, a friendly reminder...",
        )
    }

    #[test]
    fn test_validate_valid_request() {
        let mut req = valid();
        req.metadata = Some(json!({"invoice_id": "inv-42", "client_id": "c-7"}));
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn test_validate_recipient_empty() {
        let mut req = valid();
        req.to = "   ".to_string();
        let result = validate_request(&req);
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_recipient_malformed() {
        for bad in ["client.example.com", "@example.com", "client@", "a@b@c", "a b@c.com"] {
            let mut req = valid();
            req.to = bad.to_string();
            assert!(validate_request(&req).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_validate_subject_too_long() {
        let mut req = valid();
        req.subject = "a".repeat(MAX_SUBJECT_LEN + 1);
        let result = validate_request(&req);
        assert!(result.unwrap_err().to_string().contains("too long"));
    }

    #[test]
    fn test_validate_content_empty() {
        let mut req = valid();
        req.content = String::new();
        assert!(validate_request(&req).is_err());
    }

    #[test]
    fn test_validate_metadata_must_be_object() {
        let mut req = valid();
        req.metadata = Some(json!(["inv-42"]));
        let result = validate_request(&req);
        assert!(result.unwrap_err().to_string().contains("JSON object"));
    }

    #[test]
    fn test_request_defaults_from_json() {
        let req: EnqueueEmailRequest = serde_json::from_value(json!({
            "to": "client@example.com",
            "subject": "Reminder",
            "content": "Body"
        }))
        .unwrap();
        assert_eq!(req.priority, crate::domain::Priority::Normal);
        assert!(req.scheduled_at.is_none());
        assert!(req.metadata.is_none());
    }
}
