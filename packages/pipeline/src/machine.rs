//! The per-`search_id` state machine: a pure, synchronous
//! `decide(event) -> Option<command>` transition function, following
//! [`seesaw::Machine`]'s contract of producing at most one command
//! per event with no side effects of its own.

use std::collections::HashMap;

use seesaw::Machine;

use crate::commands::PipelineCommand;
use crate::events::PipelineEvent;
use crate::state::{SearchState, SearchStatus};
use crate::types::{Candidate, SearchOutcome, Target};

/// Top-m fragments sent to `classify+ingest` after ranking.
const CLASSIFY_TOP_M: usize = 8;

pub struct SearchMachine {
    searches: HashMap<String, SearchState>,
    default_pages_budget: u32,
}

impl SearchMachine {
    pub fn new(default_pages_budget: u32) -> Self {
        Self {
            searches: HashMap::new(),
            default_pages_budget,
        }
    }

    fn query_text(target: &Target) -> String {
        match target {
            Target::Query { text } => text.clone(),
            Target::Url { url, .. } => url.clone(),
            Target::Doi { doi, .. } => doi.clone(),
        }
    }
}

impl Machine for SearchMachine {
    type Event = PipelineEvent;
    type Command = PipelineCommand;

    fn decide(&mut self, event: &PipelineEvent) -> Option<PipelineCommand> {
        match event {
            PipelineEvent::SearchQueued {
                search_id,
                task_id,
                target,
            } => {
                let query = Self::query_text(target);
                let mut state = SearchState::new(task_id.clone(), query, self.default_pages_budget);
                state.status = SearchStatus::Planning;
                self.searches.insert(search_id.clone(), state);
                Some(PipelineCommand::Plan {
                    search_id: search_id.clone(),
                    task_id: task_id.clone(),
                    target: target.clone(),
                })
            }

            PipelineEvent::PlanReady {
                search_id,
                candidates,
            } => {
                let state = self.searches.get_mut(search_id)?;
                state.status = SearchStatus::Fetching;
                Some(PipelineCommand::Fetch {
                    search_id: search_id.clone(),
                    task_id: state.task_id.clone(),
                    candidates: candidates.clone(),
                })
            }

            PipelineEvent::PlanEmpty { search_id } => {
                let state = self.searches.get_mut(search_id)?;
                state.status = SearchStatus::Terminal(SearchOutcome::Exhausted);
                Some(PipelineCommand::Finalize {
                    search_id: search_id.clone(),
                    outcome: SearchOutcome::Exhausted,
                    metrics: state.metrics_snapshot(),
                })
            }

            PipelineEvent::PagesFetched { search_id, pages, .. } => {
                let state = self.searches.get_mut(search_id)?;
                state.record_pages_fetched(pages.len() as u32);
                if pages.is_empty() {
                    state.status = SearchStatus::Terminal(SearchOutcome::Partial);
                    return Some(PipelineCommand::Finalize {
                        search_id: search_id.clone(),
                        outcome: SearchOutcome::Partial,
                        metrics: state.metrics_snapshot(),
                    });
                }
                if state.pages_budget_exhausted() {
                    state.status = SearchStatus::Terminal(SearchOutcome::Exhausted);
                    return Some(PipelineCommand::Finalize {
                        search_id: search_id.clone(),
                        outcome: SearchOutcome::Exhausted,
                        metrics: state.metrics_snapshot(),
                    });
                }
                state.status = SearchStatus::Extracting;
                Some(PipelineCommand::Extract {
                    search_id: search_id.clone(),
                    task_id: state.task_id.clone(),
                    pages: pages.clone(),
                })
            }

            PipelineEvent::FragmentsExtracted {
                search_id,
                fragments,
            } => {
                let state = self.searches.get_mut(search_id)?;
                state.status = SearchStatus::Ranking;
                Some(PipelineCommand::Rank {
                    search_id: search_id.clone(),
                    query: state.query.clone(),
                    fragments: fragments.clone(),
                })
            }

            PipelineEvent::FragmentsRanked { search_id, ranked } => {
                let state = self.searches.get_mut(search_id)?;
                state.status = SearchStatus::ClassifyingIngesting;
                let top_m: Vec<_> = ranked.iter().take(CLASSIFY_TOP_M).cloned().collect();
                Some(PipelineCommand::ClassifyIngest {
                    search_id: search_id.clone(),
                    task_id: state.task_id.clone(),
                    fragments: top_m,
                })
            }

            PipelineEvent::ClaimsIngested {
                search_id,
                claims_ingested,
                independent_supporting_total,
                primary_supporting,
                secondary_supporting,
                fragments_seen_this_round,
                source_page_ids,
            } => {
                let state = self.searches.get_mut(search_id)?;
                state.record_ingestion_round(
                    *independent_supporting_total,
                    *primary_supporting,
                    *secondary_supporting,
                    *fragments_seen_this_round,
                    *claims_ingested,
                );

                if let Some(outcome) = state.stopping_condition() {
                    state.status = SearchStatus::Terminal(outcome);
                    return Some(PipelineCommand::Finalize {
                        search_id: search_id.clone(),
                        outcome,
                        metrics: state.metrics_snapshot(),
                    });
                }

                if state.citation_budget_remaining() && !source_page_ids.is_empty() {
                    state.citation_iterations += 1;
                    state.status = SearchStatus::ExpandingCitations;
                    Some(PipelineCommand::ExpandCitations {
                        search_id: search_id.clone(),
                        task_id: state.task_id.clone(),
                        page_ids: source_page_ids.clone(),
                    })
                } else {
                    state.status = SearchStatus::Terminal(SearchOutcome::Partial);
                    Some(PipelineCommand::Finalize {
                        search_id: search_id.clone(),
                        outcome: SearchOutcome::Partial,
                        metrics: state.metrics_snapshot(),
                    })
                }
            }

            PipelineEvent::CitationsExpanded { search_id, .. } => {
                // New targets are handed off as a fact for the external
                // strategist to act on via `queue_targets` — the
                // executor never invents queries, so this search
                // cycle ends here regardless of what was found.
                let state = self.searches.get_mut(search_id)?;
                state.status = SearchStatus::Terminal(SearchOutcome::Partial);
                Some(PipelineCommand::Finalize {
                    search_id: search_id.clone(),
                    outcome: SearchOutcome::Partial,
                    metrics: state.metrics_snapshot(),
                })
            }

            PipelineEvent::SearchFinalized { search_id, .. } => {
                self.searches.remove(search_id);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{FetchedCandidate, RankableFragment};
    use domain_policy::trust::SourceTrustLevel;
    use evidence_graph::ids::{FragmentId, PageId};

    fn plan_ready(search_id: &str, n: usize) -> PipelineEvent {
        PipelineEvent::PlanReady {
            search_id: search_id.to_string(),
            candidates: (0..n)
                .map(|i| Candidate::Url(format!("https://example.org/{i}")))
                .collect(),
        }
    }

    #[test]
    fn search_queued_starts_plan() {
        let mut machine = SearchMachine::new(10);
        let cmd = machine.decide(&PipelineEvent::SearchQueued {
            search_id: "s1".into(),
            task_id: "t1".into(),
            target: Target::Query {
                text: "warp drive feasibility".into(),
            },
        });
        assert!(matches!(cmd, Some(PipelineCommand::Plan { .. })));
    }

    #[test]
    fn empty_fetch_result_finalizes_partial() {
        let mut machine = SearchMachine::new(10);
        machine.decide(&PipelineEvent::SearchQueued {
            search_id: "s1".into(),
            task_id: "t1".into(),
            target: Target::Query { text: "q".into() },
        });
        machine.decide(&plan_ready("s1", 1));
        let cmd = machine.decide(&PipelineEvent::PagesFetched {
            search_id: "s1".into(),
            pages: Vec::new(),
            auth_required: Vec::new(),
        });
        assert!(matches!(
            cmd,
            Some(PipelineCommand::Finalize {
                outcome: SearchOutcome::Partial,
                ..
            })
        ));
    }

    #[test]
    fn three_independent_supports_satisfy_the_search() {
        let mut machine = SearchMachine::new(100);
        machine.decide(&PipelineEvent::SearchQueued {
            search_id: "s1".into(),
            task_id: "t1".into(),
            target: Target::Query { text: "q".into() },
        });
        machine.decide(&plan_ready("s1", 1));
        machine.decide(&PipelineEvent::PagesFetched {
            search_id: "s1".into(),
            pages: vec![FetchedCandidate {
                page_id: PageId::new(),
                url: "https://example.org".into(),
                bytes: b"hi".to_vec(),
                content_type: "text/html".into(),
                source_trust_level: SourceTrustLevel::Trusted,
            }],
            auth_required: Vec::new(),
        });
        machine.decide(&PipelineEvent::FragmentsExtracted {
            search_id: "s1".into(),
            fragments: vec![RankableFragment {
                fragment_id: FragmentId::new(),
                page_id: PageId::new(),
                text: "the finding".into(),
                heading_context: None,
                source_trust_level: SourceTrustLevel::Trusted,
            }],
        });
        machine.decide(&PipelineEvent::FragmentsRanked {
            search_id: "s1".into(),
            ranked: vec![RankableFragment {
                fragment_id: FragmentId::new(),
                page_id: PageId::new(),
                text: "the finding".into(),
                heading_context: None,
                source_trust_level: SourceTrustLevel::Trusted,
            }],
        });
        let cmd = machine.decide(&PipelineEvent::ClaimsIngested {
            search_id: "s1".into(),
            claims_ingested: 1,
            independent_supporting_total: 3,
            primary_supporting: true,
            secondary_supporting: false,
            fragments_seen_this_round: 1,
            source_page_ids: vec![PageId::new()],
        });
        assert!(matches!(
            cmd,
            Some(PipelineCommand::Finalize {
                outcome: SearchOutcome::Satisfied,
                ..
            })
        ));
    }

    #[test]
    fn no_citation_sources_ends_in_partial_without_expanding() {
        let mut machine = SearchMachine::new(100);
        machine.decide(&PipelineEvent::SearchQueued {
            search_id: "s1".into(),
            task_id: "t1".into(),
            target: Target::Query { text: "q".into() },
        });
        machine.decide(&plan_ready("s1", 1));
        machine.decide(&PipelineEvent::PagesFetched {
            search_id: "s1".into(),
            pages: vec![FetchedCandidate {
                page_id: PageId::new(),
                url: "https://example.org".into(),
                bytes: b"hi".to_vec(),
                content_type: "text/html".into(),
                source_trust_level: SourceTrustLevel::Trusted,
            }],
            auth_required: Vec::new(),
        });
        machine.decide(&PipelineEvent::FragmentsExtracted {
            search_id: "s1".into(),
            fragments: Vec::new(),
        });
        machine.decide(&PipelineEvent::FragmentsRanked {
            search_id: "s1".into(),
            ranked: Vec::new(),
        });

        let cmd = machine.decide(&PipelineEvent::ClaimsIngested {
            search_id: "s1".into(),
            claims_ingested: 0,
            independent_supporting_total: 0,
            primary_supporting: false,
            secondary_supporting: false,
            fragments_seen_this_round: 1,
            source_page_ids: Vec::new(),
        });
        assert!(matches!(
            cmd,
            Some(PipelineCommand::Finalize {
                outcome: SearchOutcome::Partial,
                ..
            })
        ));
    }

    #[test]
    fn citation_expansion_hands_off_to_strategist_and_finalizes() {
        let mut machine = SearchMachine::new(100);
        machine.decide(&PipelineEvent::SearchQueued {
            search_id: "s1".into(),
            task_id: "t1".into(),
            target: Target::Query { text: "q".into() },
        });
        machine.decide(&plan_ready("s1", 1));
        machine.decide(&PipelineEvent::PagesFetched {
            search_id: "s1".into(),
            pages: vec![FetchedCandidate {
                page_id: PageId::new(),
                url: "https://example.org".into(),
                bytes: b"hi".to_vec(),
                content_type: "text/html".into(),
                source_trust_level: SourceTrustLevel::Trusted,
            }],
            auth_required: Vec::new(),
        });
        machine.decide(&PipelineEvent::FragmentsExtracted {
            search_id: "s1".into(),
            fragments: Vec::new(),
        });
        machine.decide(&PipelineEvent::FragmentsRanked {
            search_id: "s1".into(),
            ranked: Vec::new(),
        });

        let cmd = machine.decide(&PipelineEvent::ClaimsIngested {
            search_id: "s1".into(),
            claims_ingested: 0,
            independent_supporting_total: 0,
            primary_supporting: false,
            secondary_supporting: false,
            fragments_seen_this_round: 1,
            source_page_ids: vec![PageId::new()],
        });
        assert!(matches!(cmd, Some(PipelineCommand::ExpandCitations { .. })));

        let cmd = machine.decide(&PipelineEvent::CitationsExpanded {
            search_id: "s1".into(),
            new_targets: vec![Target::Url {
                url: "https://example.org/cited".into(),
                reason: "citation".into(),
            }],
        });
        assert!(matches!(
            cmd,
            Some(PipelineCommand::Finalize {
                outcome: SearchOutcome::Partial,
                ..
            })
        ));
    }
}
