// Route Classifier
// Ordered prefix rules; the first matching rule decides the category.

use crate::domain::RouteCategory;

/// One (predicate, category) rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub prefix: &'static str,
    pub category: RouteCategory,
}

impl ClassificationRule {
    pub const fn new(prefix: &'static str, category: RouteCategory) -> Self {
        Self { prefix, category }
    }

    pub fn matches(&self, delivery_id: &str) -> bool {
        delivery_id.starts_with(self.prefix)
    }
}

/// Default rule table, most specific prefix first
pub const DEFAULT_RULES: &[ClassificationRule] = &[
    ClassificationRule::new("368", RouteCategory::Stock),
    ClassificationRule::new("369", RouteCategory::Delivery),
    ClassificationRule::new("34", RouteCategory::Delivery),
    ClassificationRule::new("37", RouteCategory::Collection),
];

#[derive(Debug, Clone)]
pub struct RouteClassifier {
    rules: Vec<ClassificationRule>,
}

impl RouteClassifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// `None` means the record is left off the map
    pub fn classify(&self, delivery_id: &str) -> Option<RouteCategory> {
        self.rules
            .iter()
            .find(|rule| rule.matches(delivery_id))
            .map(|rule| rule.category)
    }
}

impl Default for RouteClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.to_vec())
    }
}
