// src/services/selection.rs
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::MarketOverview;

/// Which agencies and funding offices are currently selected, with the
/// office-to-agency linkage kept consistent across toggles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionState {
    pub agencies: BTreeSet<String>,
    pub offices: BTreeSet<String>,
    #[serde(skip)]
    parents: BTreeMap<String, String>,
}

impl SelectionState {
    /// Everything in the overview starts out selected. Parents of offices
    /// that fall outside the top-N agency breakdown are selected too.
    pub fn all(overview: &MarketOverview) -> Self {
        let parents: BTreeMap<String, String> = overview
            .funding_offices
            .iter()
            .map(|office| (office.key.clone(), office.parent_agency_key().to_string()))
            .collect();

        let agencies = overview
            .agency_breakdown
            .iter()
            .map(|agency| agency.key().to_string())
            .chain(parents.values().cloned())
            .collect();

        SelectionState {
            agencies,
            offices: parents.keys().cloned().collect(),
            parents,
        }
    }

    pub fn parent_of(&self, office: &str) -> Option<&str> {
        self.parents.get(office).map(String::as_str)
    }

    fn offices_of<'a>(&'a self, agency: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.parents
            .iter()
            .filter(move |(_, parent)| parent.as_str() == agency)
            .map(|(office, _)| office)
    }

    /// Selecting an office selects its parent agency. Deselecting it also
    /// deselects the parent once no selected office shares that parent.
    /// Returns whether the office is selected afterwards.
    pub fn toggle_office(&mut self, office: &str) -> bool {
        let Some(parent) = self.parents.get(office).cloned() else {
            return false;
        };

        if self.offices.remove(office) {
            let siblings_selected = self
                .offices_of(&parent)
                .any(|sibling| self.offices.contains(sibling));
            if !siblings_selected {
                self.agencies.remove(&parent);
            }
            false
        } else {
            self.offices.insert(office.to_string());
            self.agencies.insert(parent);
            true
        }
    }

    /// Selecting an agency selects all of its offices. Deselecting it
    /// deselects the offices left without a selected parent.
    /// Returns whether the agency is selected afterwards.
    pub fn toggle_agency(&mut self, agency: &str) -> bool {
        let offices: Vec<String> = self.offices_of(agency).cloned().collect();

        if self.agencies.remove(agency) {
            for office in offices {
                let parent_selected = self
                    .parents
                    .get(&office)
                    .is_some_and(|parent| self.agencies.contains(parent));
                if !parent_selected {
                    self.offices.remove(&office);
                }
            }
            false
        } else {
            self.agencies.insert(agency.to_string());
            self.offices.extend(offices);
            true
        }
    }
}
