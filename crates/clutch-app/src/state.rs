// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{FilterCriteria, FilterMode, SortDirection, SortMethod, SortSpec};

/// User-controlled filter and sort configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub filter: FilterCriteria,
    pub sort: SortSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand {
    SetFilterMode(FilterMode),
    SetFilterText(String),
    SetFilterTracker(Option<String>),
    SetSortMethod(SortMethod),
    SetSortDirection(SortDirection),
    ToggleSortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    FilterChanged(FilterCriteria),
    SortChanged(SortSpec),
}

impl ViewState {
    pub fn new(filter: FilterCriteria, sort: SortSpec) -> Self {
        Self { filter, sort }
    }

    pub fn dispatch(&mut self, command: ViewCommand) -> Vec<ViewEvent> {
        match command {
            ViewCommand::SetFilterMode(mode) => {
                let next = FilterCriteria {
                    mode,
                    ..self.filter.clone()
                };
                self.replace_filter(next)
            }
            ViewCommand::SetFilterText(text) => {
                let next = FilterCriteria {
                    text: text.trim().to_owned(),
                    ..self.filter.clone()
                };
                self.replace_filter(next)
            }
            ViewCommand::SetFilterTracker(domain) => {
                let next = FilterCriteria {
                    tracker_domain: domain.filter(|domain| !domain.is_empty()),
                    ..self.filter.clone()
                };
                self.replace_filter(next)
            }
            ViewCommand::SetSortMethod(method) => self.replace_sort(SortSpec {
                method,
                ..self.sort
            }),
            ViewCommand::SetSortDirection(direction) => self.replace_sort(SortSpec {
                direction,
                ..self.sort
            }),
            ViewCommand::ToggleSortDirection => self.replace_sort(SortSpec {
                direction: self.sort.direction.reversed(),
                ..self.sort
            }),
        }
    }

    fn replace_filter(&mut self, next: FilterCriteria) -> Vec<ViewEvent> {
        if self.filter == next {
            return Vec::new();
        }
        self.filter = next;
        vec![ViewEvent::FilterChanged(self.filter.clone())]
    }

    fn replace_sort(&mut self, next: SortSpec) -> Vec<ViewEvent> {
        if self.sort == next {
            return Vec::new();
        }
        self.sort = next;
        vec![ViewEvent::SortChanged(self.sort)]
    }
}
