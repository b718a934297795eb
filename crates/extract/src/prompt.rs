use crate::schema::EntityKind;

/// Option table rendered as `A → Stapler` lines.
pub fn mapping_table(kind: EntityKind) -> String {
    kind.labels()
        .iter()
        .map(|(letter, name)| format!("{} → {}", letter, name))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_extraction_prompt(kind: EntityKind, response: &str) -> String {
    let task = kind.as_str();
    let mut heading = task.to_string();
    if let Some(first) = heading.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    format!(
        r#"Analyze the following response from a surgical AI agent and extract only the final {task} prediction.
If the answer is unclear, return "unknown". If the response specifies an option (e.g. "Option (D)"), use the mapping below.

{heading} Mapping:
{mapping}

Response:
{response}

Return only the extracted {task} name, without any extra text."#,
        task = task,
        heading = heading,
        mapping = mapping_table(kind),
        response = response,
    )
}
