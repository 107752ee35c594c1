//! Finite state machine

use std::fmt::Debug;

/// C-enums that implement this trait can undergo state machine transitions.
///
/// There are no outputs during state transitions, just changes in state.
pub trait TransitableState: Clone + Copy + Debug + Default + PartialEq {
    /// Events that can trigger a change in state.
    type Event: Debug;

    /// Process the input and modify the internal state, if applicable.
    ///
    /// Use the [state_transitions!] macro to implement this trait.
    fn ingest(&mut self, event: Self::Event);
}

/// Generate the state transition logic.
///
/// This macro implements [TransitableState::ingest]. Pairs not listed leave the state unchanged,
/// so callers detect a rejected event by comparing states.
///
/// ```ignore
/// state_transitions! {
///     type State = Section;
///     type Event = SectionEvent;
///
///     Offset + Patched => Body;
///     Body + Consumed | Empty => Metas;
/// }
/// ```
macro_rules! state_transitions {
    {
        type State = $st: ident;
        type Event = $ev: ident;

        $($st_variant: ident + $($ev_variant: ident)|+ => $new_st: ident;)*
    } => {

        impl $crate::fsm::TransitableState for $st {
            type Event = $ev;

            fn ingest(&mut self, event: Self::Event) {

                *self = match (*self, event) {

                    $(
                        ($st::$st_variant, $($ev::$ev_variant)|+) => $st::$new_st,
                    )*

                    // all other cases
                    #[allow(unreachable_patterns)]
                    _ => *self,
                };

            }
        }
    };
}

pub(crate) use state_transitions;

#[cfg(test)]
mod tests {
    use super::*;

    /// Sections of a framed compatible message.
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    enum Section {
        #[default]
        Offset,
        Body,
        Metas,
        Done,
    }

    #[derive(Debug)]
    enum SectionEvent {
        Patched,
        Consumed,
        Empty,
        Counted,
    }

    state_transitions! {
        type State = Section;
        type Event = SectionEvent;

        Offset + Patched => Body;
        Body + Consumed | Empty => Metas;
        Metas + Counted => Done;
    }

    #[test]
    fn test_listed_pairs_advance() {
        let mut section = Section::default();

        section.ingest(SectionEvent::Patched);
        assert_eq!(section, Section::Body);
        section.ingest(SectionEvent::Empty);
        assert_eq!(section, Section::Metas);
        section.ingest(SectionEvent::Counted);
        assert_eq!(section, Section::Done);
    }

    #[test]
    fn test_unlisted_pairs_hold() {
        let mut section = Section::default();

        section.ingest(SectionEvent::Consumed);
        assert_eq!(section, Section::Offset);

        section.ingest(SectionEvent::Patched);
        section.ingest(SectionEvent::Patched);
        assert_eq!(section, Section::Body);

        section.ingest(SectionEvent::Consumed);
        section.ingest(SectionEvent::Consumed);
        assert_eq!(section, Section::Metas);
    }
}
