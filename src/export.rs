use crate::models::Creation;

/// Download name for an exported creation: every non-alphanumeric character
/// becomes an underscore, lower-cased.
pub fn export_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    format!("{sanitized}_artifact.json")
}

/// Serialize the full creation record as a structured document. Parsing the
/// result yields a record equal in all fields (round-trip fidelity).
pub fn export_document(creation: &Creation) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(creation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArtifactPayload;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[test]
    fn file_name_is_sanitized_and_lowercased() {
        assert_eq!(export_file_name("Bridge Sketch v2!"), "bridge_sketch_v2__artifact.json");
        assert_eq!(export_file_name("plan"), "plan_artifact.json");
        assert_eq!(export_file_name("Étude #1"), "_tude__1_artifact.json");
    }

    #[test]
    fn export_round_trips_every_field() {
        let creation = Creation {
            id: Uuid::new_v4(),
            name: "Floor Plan".into(),
            html: "<h1>ok</h1>".into(),
            original_image: Some(ArtifactPayload {
                media_type: "application/pdf".into(),
                data: "JVBERi0=".into(),
            }),
            timestamp: Utc::now(),
        };
        let bytes = export_document(&creation).unwrap();
        let parsed: Creation = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, creation);
    }
}
