pub mod fleet;
pub mod reconciler;
pub mod simulator;
pub mod wrappers;

/// The [`StateMachine`] trait gives the fleet core one calling convention and marks the types that
/// promise deterministic behaviour.
///
/// # Functionality
/// Each machine consumes a single [`Input`](StateMachine::Input) type, usually an enum of the
/// events it reacts to (a tick, an upsert, a filter change), and exposes whatever it produced as
/// [`Output`](StateMachine::Output) through [`poll_output`](StateMachine::poll_output).
///
/// The inherent impl of a machine holds the actual logic in small `fn`s operating on one variant
/// each; the trait impl is only the dispatch from the unified enum to those methods. Callers that
/// want the richer return values (for example the merged position from an upsert) use the
/// inherent methods directly, callers that replay recorded event streams use the trait.
///
/// # Invariants
/// A [`StateMachine`] must be a pure function of the inputs it has been fed. Replaying the same
/// input sequence into a fresh machine must produce the same outputs, which is what makes the
/// fleet store, the marker reconciler and the route simulator testable without a map, a relay or
/// a clock.
///
/// Implementors *must* uphold the following.
///
/// ## No Interior Mutability
/// All state is mutated through `&mut self` only. No [`std::cell`] containers, no
/// [`std::sync`] locks, no [`Rc`](std::rc::Rc)/[`Arc`](std::sync::Arc) with shared counts. Shared
/// immutable data is limited to `&'static` values.
///
/// ## No IO
/// No [`std::io`], [`std::net`] or equivalent. Rendering and publishing happen outside the
/// machine, driven by its outputs.
///
/// ### No System Time
/// Reading [`std::time::Instant::now`] or [`std::time::SystemTime`] is forbidden. A machine that
/// needs time, such as the simulator stamping `last_updated`, receives it as part of its input.
///
/// ### No System RNG
/// Randomness must come from a PRNG whose seed arrived via input.
///
/// ## No Concurrency, No Async, No Blocking
/// Machines never spawn threads or tasks, never `await` and never block. A single
/// [`process_input`](StateMachine::process_input) call costs at most one pass over the affected
/// vehicles so the event loop that owns the machine is never stalled.
///
/// # Side Effects
/// Logging through `tracing` is allowed as long as no state transition depends on it.
///
/// # Injecting Time
/// The binaries wrap these machines in runners that read the clock and hand the value in. See the
/// [`wrappers`] module for the [`SystemResource`](wrappers::input::system::SystemResource) trait
/// used for that.
///
/// # Example
/// ```ignore
/// let mut reconciler = MarkerReconciler::new();
/// reconciler.process_input(ReconcileInput::Reconcile {
///     position,
///     filter: LineFilter::All,
/// });
///
/// while let Some(command) = reconciler.poll_output() {
///     surface.apply(command);
/// }
/// ```
pub trait StateMachine {
    /// The type of input that is [processed](StateMachine::process_input) by the state machine.
    type Input;
    /// The type of output that is [polled](StateMachine::poll_output) from the state machine.
    type Output;

    /// Feed one input into the machine, dispatching it to the matching inherent method.
    fn process_input(&mut self, input: Self::Input);

    /// Take the next pending output, if any.
    fn poll_output(&mut self) -> Option<Self::Output>;
}
