// ── Generic finite-state-machine engine ──
//
// A machine is a transition table plus optional enter callbacks. Moves not
// present in the table are rejected and logged; the machine stays where it
// was. An enter callback may request one follow-up transition, which is
// applied after the current one completes.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use tracing::{debug, warn};

/// Follow-up transitions applied for a single external request before the
/// engine assumes a cycle and stops.
pub const MAX_CHAINED_TRANSITIONS: usize = 16;

/// Callback run when a state is entered.
///
/// Receives the driver context, the payload of the transition, and the
/// `(from, to)` pair. Returning `Some` requests a follow-up transition.
pub type EnterFn<S, C, P> = Box<dyn FnMut(&mut C, &P, S, S) -> Option<(S, P)> + Send>;

/// Hook run after every accepted transition.
pub type ChangeFn<S, C, P> = Box<dyn FnMut(&mut C, S, S, &P) + Send>;

// ── StateMachine ─────────────────────────────────────────────────────

pub struct StateMachine<S, C, P> {
    name: &'static str,
    state: S,
    transitions: HashMap<S, HashSet<S>>,
    on_enter: HashMap<S, EnterFn<S, C, P>>,
    on_change: Option<ChangeFn<S, C, P>>,
}

impl<S, C, P> StateMachine<S, C, P>
where
    S: Copy + Eq + Hash + Debug,
{
    pub fn builder(name: &'static str, initial: S) -> StateMachineBuilder<S, C, P> {
        StateMachineBuilder {
            machine: Self {
                name,
                state: initial,
                transitions: HashMap::new(),
                on_enter: HashMap::new(),
                on_change: None,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> S {
        self.state
    }

    /// Whether the table allows moving from the current state to `to`.
    pub fn can_transition(&self, to: S) -> bool {
        self.transitions
            .get(&self.state)
            .is_some_and(|targets| targets.contains(&to))
    }

    /// Attempt a transition.
    ///
    /// Returns `false` if the move is not in the table, in which case
    /// nothing happens. On success the enter callback for `to` runs, then
    /// the change hook, then any follow-up the callback requested.
    pub fn transition(&mut self, to: S, payload: P, cx: &mut C) -> bool {
        let Some(mut next) = self.step(to, payload, cx) else {
            return false;
        };

        let mut hops = 0;
        while let Some((to, payload)) = next.take() {
            hops += 1;
            if hops > MAX_CHAINED_TRANSITIONS {
                warn!(
                    machine = self.name,
                    state = ?self.state,
                    "follow-up transition limit reached, stopping chain"
                );
                break;
            }
            match self.step(to, payload, cx) {
                Some(follow) => next = follow,
                None => break,
            }
        }

        true
    }

    /// Force the machine back to `state` without running any callbacks.
    pub fn reset(&mut self, state: S) {
        debug!(machine = self.name, from = ?self.state, to = ?state, "reset");
        self.state = state;
    }

    /// Perform one checked move. `None` means rejected; `Some(follow)`
    /// carries the follow-up request, if any.
    #[allow(clippy::option_option)]
    fn step(&mut self, to: S, payload: P, cx: &mut C) -> Option<Option<(S, P)>> {
        let from = self.state;
        if !self.can_transition(to) {
            warn!(machine = self.name, ?from, ?to, "transition rejected");
            return None;
        }

        self.state = to;
        debug!(machine = self.name, ?from, ?to, "transition");

        let follow = self
            .on_enter
            .get_mut(&to)
            .and_then(|enter| enter(cx, &payload, from, to));

        if let Some(hook) = self.on_change.as_mut() {
            hook(cx, from, to, &payload);
        }

        Some(follow)
    }
}

impl<S: Debug, C, P> Debug for StateMachine<S, C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ── Builder ──────────────────────────────────────────────────────────

pub struct StateMachineBuilder<S, C, P> {
    machine: StateMachine<S, C, P>,
}

impl<S, C, P> StateMachineBuilder<S, C, P>
where
    S: Copy + Eq + Hash + Debug,
{
    /// Allow moves from `from` to each of `targets`.
    pub fn allow(mut self, from: S, targets: &[S]) -> Self {
        self.machine
            .transitions
            .entry(from)
            .or_default()
            .extend(targets.iter().copied());
        self
    }

    pub fn on_enter(
        mut self,
        state: S,
        enter: impl FnMut(&mut C, &P, S, S) -> Option<(S, P)> + Send + 'static,
    ) -> Self {
        self.machine.on_enter.insert(state, Box::new(enter));
        self
    }

    pub fn on_change(mut self, hook: impl FnMut(&mut C, S, S, &P) + Send + 'static) -> Self {
        self.machine.on_change = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> StateMachine<S, C, P> {
        self.machine
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Door {
        Closed,
        Opening,
        Open,
        Jammed,
    }

    #[derive(Default)]
    struct Log {
        entered: Vec<Door>,
        changes: Vec<(Door, Door)>,
    }

    fn door() -> StateMachine<Door, Log, u32> {
        StateMachine::builder("door", Door::Closed)
            .allow(Door::Closed, &[Door::Opening])
            .allow(Door::Opening, &[Door::Open, Door::Jammed])
            .allow(Door::Open, &[Door::Closed])
            .allow(Door::Jammed, &[Door::Closed])
            .on_enter(Door::Opening, |log: &mut Log, force: &u32, _, to| {
                log.entered.push(to);
                if *force > 10 {
                    Some((Door::Jammed, 0))
                } else {
                    None
                }
            })
            .on_enter(Door::Jammed, |log: &mut Log, _: &u32, _, to| {
                log.entered.push(to);
                None
            })
            .on_change(|log: &mut Log, from, to, _: &u32| log.changes.push((from, to)))
            .build()
    }

    #[test]
    fn accepted_transition_runs_enter_and_change() {
        let mut fsm = door();
        let mut log = Log::default();
        assert!(fsm.transition(Door::Opening, 1, &mut log));
        assert_eq!(fsm.state(), Door::Opening);
        assert_eq!(log.entered, vec![Door::Opening]);
        assert_eq!(log.changes, vec![(Door::Closed, Door::Opening)]);
    }

    #[test]
    fn rejected_transition_changes_nothing() {
        let mut fsm = door();
        let mut log = Log::default();
        assert!(!fsm.can_transition(Door::Open));
        assert!(!fsm.transition(Door::Open, 0, &mut log));
        assert_eq!(fsm.state(), Door::Closed);
        assert!(log.entered.is_empty());
        assert!(log.changes.is_empty());
    }

    #[test]
    fn follow_up_runs_after_current_transition() {
        let mut fsm = door();
        let mut log = Log::default();
        assert!(fsm.transition(Door::Opening, 50, &mut log));
        assert_eq!(fsm.state(), Door::Jammed);
        assert_eq!(log.entered, vec![Door::Opening, Door::Jammed]);
        assert_eq!(
            log.changes,
            vec![(Door::Closed, Door::Opening), (Door::Opening, Door::Jammed)]
        );
    }

    #[test]
    fn cyclic_follow_ups_are_bounded() {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        enum Ping {
            A,
            B,
        }
        let mut fsm: StateMachine<Ping, usize, ()> = StateMachine::builder("ping", Ping::A)
            .allow(Ping::A, &[Ping::B])
            .allow(Ping::B, &[Ping::A])
            .on_enter(Ping::A, |n: &mut usize, _: &(), _, _| {
                *n += 1;
                Some((Ping::B, ()))
            })
            .on_enter(Ping::B, |n: &mut usize, _: &(), _, _| {
                *n += 1;
                Some((Ping::A, ()))
            })
            .build();

        let mut entered = 0;
        assert!(fsm.transition(Ping::B, (), &mut entered));
        assert_eq!(entered, MAX_CHAINED_TRANSITIONS + 1);
    }

    #[test]
    fn reset_skips_callbacks() {
        let mut fsm = door();
        let mut log = Log::default();
        fsm.transition(Door::Opening, 1, &mut log);
        fsm.reset(Door::Closed);
        assert_eq!(fsm.state(), Door::Closed);
        assert_eq!(log.changes.len(), 1);
    }
}
