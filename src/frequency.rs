use serde::Serialize;
use std::collections::BTreeMap;

use crate::nlp::{AnnotatedDocument, PosTag};

/// The five word-cloud categories, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Noun,
    Verb,
    Adjective,
    ProperNoun,
    NamedEntity,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Noun,
        Category::Verb,
        Category::Adjective,
        Category::ProperNoun,
        Category::NamedEntity,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Category::Noun => "Sustantivos más comunes",
            Category::Verb => "Verbos más comunes",
            Category::Adjective => "Adjetivos más comunes",
            Category::ProperNoun => "Nombres propios más comunes",
            Category::NamedEntity => "Entidades más comunes",
        }
    }

    /// Part of speech counted by this category; `None` for entities.
    pub fn pos(self) -> Option<PosTag> {
        match self {
            Category::Noun => Some(PosTag::Noun),
            Category::Verb => Some(PosTag::Verb),
            Category::Adjective => Some(PosTag::Adjective),
            Category::ProperNoun => Some(PosTag::ProperNoun),
            Category::NamedEntity => None,
        }
    }
}

/// Term -> occurrence count. Only terms seen at least once are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FrequencyCounter {
    counts: BTreeMap<String, usize>,
}

impl FrequencyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, term: impl Into<String>) {
        *self.counts.entry(term.into()).or_insert(0) += 1;
    }

    pub fn get(&self, term: &str) -> usize {
        self.counts.get(term).copied().unwrap_or(0)
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(term, count)| (term.as_str(), *count))
    }

    /// Up to `n` terms by descending count; equal counts are ordered by term.
    pub fn most_common(&self, n: usize) -> Vec<(&str, usize)> {
        let mut terms: Vec<(&str, usize)> = self.iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        terms.truncate(n);
        terms
    }
}

impl<S: Into<String>> FromIterator<S> for FrequencyCounter {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut counter = FrequencyCounter::new();
        for term in iter {
            counter.add(term);
        }
        counter
    }
}

/// Count one category over all documents.
///
/// POS categories count the surface text of each token tagged with the
/// category's part of speech; the entity category counts entity strings.
pub fn aggregate(documents: &[AnnotatedDocument], category: Category) -> FrequencyCounter {
    match category.pos() {
        Some(pos) => documents
            .iter()
            .flat_map(|doc| doc.tokens.iter())
            .filter(|token| token.pos == pos)
            .map(|token| token.text.as_str())
            .collect(),
        None => documents
            .iter()
            .flat_map(|doc| doc.entities.iter())
            .map(String::as_str)
            .collect(),
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryCounters {
    pub nouns: FrequencyCounter,
    pub verbs: FrequencyCounter,
    pub adjectives: FrequencyCounter,
    pub proper_nouns: FrequencyCounter,
    pub entities: FrequencyCounter,
}

impl CategoryCounters {
    pub fn get(&self, category: Category) -> &FrequencyCounter {
        match category {
            Category::Noun => &self.nouns,
            Category::Verb => &self.verbs,
            Category::Adjective => &self.adjectives,
            Category::ProperNoun => &self.proper_nouns,
            Category::NamedEntity => &self.entities,
        }
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c).is_empty())
    }
}

pub fn aggregate_all(documents: &[AnnotatedDocument]) -> CategoryCounters {
    CategoryCounters {
        nouns: aggregate(documents, Category::Noun),
        verbs: aggregate(documents, Category::Verb),
        adjectives: aggregate(documents, Category::Adjective),
        proper_nouns: aggregate(documents, Category::ProperNoun),
        entities: aggregate(documents, Category::NamedEntity),
    }
}
