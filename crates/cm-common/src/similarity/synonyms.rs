use std::sync::LazyLock;

use super::normalize_label;

/// Care skill → bilingual variants. Order matters: the first key that overlaps the input wins.
const SKILL_VARIANTS: &[(&str, &[&str])] = &[
    (
        "tiêm insulin",
        &["tiêm", "insulin", "tiêm thuốc", "injection"],
    ),
    (
        "chăm sóc vết thương",
        &["vết thương", "wound care", "chăm sóc", "băng bó"],
    ),
    (
        "đo huyết áp",
        &["huyết áp", "blood pressure", "đo", "vital signs"],
    ),
    ("cho ăn", &["feeding", "ăn uống", "meal", "nutrition"]),
    ("tắm rửa", &["bathing", "tắm", "vệ sinh", "hygiene"]),
    (
        "vận động",
        &["exercise", "physical therapy", "tập luyện", "mobility"],
    ),
    (
        "đo đường huyết",
        &["đường huyết", "blood sugar", "glucose", "diabetes"],
    ),
    (
        "quản lý thuốc",
        &["medication", "thuốc", "medicine", "prescription"],
    ),
    (
        "vật lý trị liệu",
        &["physical therapy", "rehabilitation", "phục hồi"],
    ),
    ("alzheimer", &["dementia", "sa sút trí tuệ", "nhận thức"]),
    ("parkinson", &["parkinson disease", "run", "tremor"]),
    ("đột quỵ", &["stroke", "liệt", "paralysis", "hemiplegia"]),
];

static NORMALIZED_VARIANTS: LazyLock<Vec<(String, Vec<String>)>> = LazyLock::new(|| {
    SKILL_VARIANTS
        .iter()
        .map(|(key, variants)| {
            (
                normalize_label(key),
                variants.iter().map(|v| normalize_label(v)).collect(),
            )
        })
        .collect()
});

/// Expand an already-normalized label into itself plus its known variants.
pub fn expand_label(normalized: &str) -> Vec<String> {
    let mut expanded = vec![normalized.to_string()];
    if normalized.is_empty() {
        return expanded;
    }

    let hit = NORMALIZED_VARIANTS
        .iter()
        .find(|(key, _)| normalized.contains(key.as_str()) || key.contains(normalized));

    if let Some((_, variants)) = hit {
        expanded.extend(variants.iter().cloned());
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_skill_with_itself_first() {
        let expanded = expand_label("tiem insulin");
        assert_eq!(expanded[0], "tiem insulin");
        assert!(expanded.contains(&"tiem".to_string()));
        assert!(expanded.contains(&"injection".to_string()));
    }

    #[test]
    fn substring_of_key_also_expands() {
        let expanded = expand_label("alzheimer");
        assert!(expanded.contains(&"dementia".to_string()));
        let longer = expand_label("cham soc benh nhan parkinson");
        assert!(longer.contains(&"tremor".to_string()));
    }

    #[test]
    fn unknown_and_empty_labels_stay_alone() {
        assert_eq!(expand_label("lam vuon"), vec!["lam vuon".to_string()]);
        assert_eq!(expand_label(""), vec![String::new()]);
    }
}
