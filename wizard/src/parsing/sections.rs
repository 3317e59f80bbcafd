/// The labels the recipe prompts ask the model to use, in the order it is asked to write them.
pub const DEFAULT_LABELS: [&str; 4] = ["Title", "Ingredients", "Instructions", "Summary"];

/// Splits a loosely structured model reply into labeled sections.
///
/// A section starts on a line beginning with `Label:` and runs until the next line
/// that begins with another recognized label, or the end of the text.
/// Labels are matched exactly, including case.
#[derive(Debug, Clone)]
pub struct SectionExtractor {
    labels: Vec<String>,
}

impl Default for SectionExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_LABELS)
    }
}

impl SectionExtractor {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Find the text under `label`, or `None` if the label never appears.
    ///
    /// A label that appears but has no content gives `Some("")`.
    pub fn find_section(&self, text: &str, label: &str) -> Option<String> {
        let prefix = format!("{label}:");
        let mut captured: Vec<&str> = vec![];
        let mut found = false;
        for line in text.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix(&prefix) {
                found = true;
                captured.push(rest.trim());
                continue;
            }
            if found && self.starts_other_section(line, label) {
                break;
            }
            if found {
                captured.push(line);
            }
        }
        found.then(|| {
            captured
                .into_iter()
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
    }

    /// Lenient form of [`Self::find_section`]: a missing label gives an empty string.
    pub fn extract_section(&self, text: &str, label: &str) -> String {
        self.find_section(text, label).unwrap_or_default()
    }

    fn starts_other_section(&self, line: &str, current: &str) -> bool {
        self.labels
            .iter()
            .filter(|l| l.as_str() != current)
            .any(|l| line.strip_prefix(l.as_str()).is_some_and(|r| r.starts_with(':')))
    }
}

/// Extract a section using the default recipe labels.
pub fn extract_section(text: &str, label: &str) -> String {
    SectionExtractor::default().extract_section(text, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use test_case::test_case;

    const REPLY: &str = indoc! {"
        Title: Garlic Butter Chicken

        Ingredients:
        - 2 chicken breasts
        - 3 cloves garlic

        Instructions:
        1. Melt the butter.
        2. Sear the chicken.

        Summary: Golden chicken glistening with garlic butter.
    "};

    #[test_case("Title" => "Garlic Butter Chicken")]
    #[test_case("Ingredients" => "- 2 chicken breasts\n- 3 cloves garlic")]
    #[test_case("Instructions" => "1. Melt the butter.\n2. Sear the chicken.")]
    #[test_case("Summary" => "Golden chicken glistening with garlic butter.")]
    #[test_case("Notes" => "")]
    fn extracts_each_section(label: &str) -> String {
        extract_section(REPLY, label)
    }

    #[test]
    fn extracts_ingredients_from_compact_reply() {
        let text = "Title: Soup\nIngredients:\n- Salt\nInstructions:\n1. Boil";
        assert_eq!(extract_section(text, "Ingredients"), "- Salt");
    }

    #[test]
    fn last_section_runs_to_end_of_input() {
        let text = "Title: Soup\nInstructions:\n1. Boil\n2. Serve\n\nEnjoy!";
        assert_eq!(
            extract_section(text, "Instructions"),
            "1. Boil\n2. Serve\nEnjoy!"
        );
    }

    #[test]
    fn labels_are_case_sensitive() {
        let text = "title: Soup\nINGREDIENTS:\n- Salt";
        assert_eq!(extract_section(text, "Title"), "");
        assert_eq!(extract_section(text, "Ingredients"), "");
    }

    #[test]
    fn indented_labels_are_recognized() {
        let text = "    Title: Soup\n    Ingredients:\n    - Salt";
        assert_eq!(extract_section(text, "Title"), "Soup");
        assert_eq!(extract_section(text, "Ingredients"), "- Salt");
    }

    #[test]
    fn repeated_label_keeps_appending() {
        let text = "Title: Soup\nTitle: Stew\nIngredients:\n- Salt";
        assert_eq!(extract_section(text, "Title"), "Soup\nStew");
    }

    #[test]
    fn unrecognized_labels_stay_inside_the_section() {
        let text = "Instructions:\n1. Boil\nTip: salt the water\nSummary: Hot soup";
        assert_eq!(
            extract_section(text, "Instructions"),
            "1. Boil\nTip: salt the water"
        );
    }

    #[test]
    fn custom_labels_delimit_sections() {
        let extractor = SectionExtractor::new(["Name", "Steps", "Tip"]);
        let text = "Name: Soup\nSteps:\nBoil\nTip: salt the water";
        assert_eq!(extractor.extract_section(text, "Steps"), "Boil");
        assert_eq!(extractor.extract_section(text, "Tip"), "salt the water");
    }

    #[test]
    fn find_section_tells_missing_from_empty() {
        let extractor = SectionExtractor::default();
        let text = "Title:\nIngredients:\n- Salt";
        assert_eq!(extractor.find_section(text, "Title"), Some(String::new()));
        assert_eq!(extractor.find_section(text, "Summary"), None);
    }
}
