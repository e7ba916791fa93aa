// src/ingest/tags.rs

/// Tags whose keywords appear in the lowercased title + description, in table
/// order, with `category` appended when not already present.
pub fn generate_tags(
    table: &[(&str, &[&str])],
    title: &str,
    description: &str,
    category: &str,
) -> Vec<String> {
    let text = format!("{} {}", title, description).to_lowercase();
    let mut tags: Vec<String> = table
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(tag, _)| (*tag).to_string())
        .collect();
    if !category.is_empty() && !tags.iter().any(|t| t == category) {
        tags.push(category.to_string());
    }
    tags
}
