use crate::error::StateError;

/// Disposition of a fallible computation.
///
/// `Value` and `Empty` are successful dispositions, `Error` is not. Only `Value`
/// carries a payload. Outcomes are built through [`Outcome::attempt_value`] or
/// [`Outcome::attempt_action`]; every transformation returns a new outcome and
/// no failure inside `attempt_*`, `map` or `filter` escapes as an error, it is
/// captured as `Error` instead.
///
/// ```rust
/// use tryout_core::outcome::Outcome;
///
/// let parsed: Outcome<i32> = Outcome::attempt_value(|| Ok("42".parse::<i32>()?));
/// let doubled = parsed.map(|v| Ok(v * 2));
///
/// assert_eq!(doubled.or_else(0), 84);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E = anyhow::Error> {
    /// Computation completed and produced a value.
    Value(T),

    /// Computation completed but produced nothing meaningful.
    Empty,

    /// Computation failed, holds the captured cause.
    Error(E),
}

impl<T, E> Outcome<T, E> {
    /// Runs `thunk` and captures its value or its error.
    pub fn attempt_value<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Result<T, E>,
    {
        match thunk() {
            Ok(value) => Outcome::Value(value),
            Err(e) => Outcome::Error(e),
        }
    }

    /// Runs `thunk` for its side effects only. Yields `Empty` on success.
    pub fn attempt_action<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Result<(), E>,
    {
        match thunk() {
            Ok(()) => Outcome::Empty,
            Err(e) => Outcome::Error(e),
        }
    }

    pub fn is_success(&self) -> bool {
        !self.is_failure()
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    pub fn has_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    /// Applies `f` to the payload, capturing its error as `Error`.
    ///
    /// `Empty` stays `Empty` and `f` is not called, there is no payload to
    /// hand it. `Error` keeps its original cause and `f` is not called either.
    pub fn map<M, F>(self, f: F) -> Outcome<M, E>
    where
        F: FnOnce(T) -> Result<M, E>,
    {
        match self {
            Outcome::Value(value) => Outcome::attempt_value(|| f(value)),
            Outcome::Empty => Outcome::Empty,
            Outcome::Error(e) => Outcome::Error(e),
        }
    }

    /// Keeps the value when `predicate` accepts it, otherwise turns into `Empty`.
    pub fn filter<P>(self, predicate: P) -> Self
    where
        P: FnOnce(&T) -> bool,
    {
        match self {
            Outcome::Value(value) => {
                if predicate(&value) {
                    Outcome::Value(value)
                } else {
                    Outcome::Empty
                }
            }
            other => other,
        }
    }

    /// Calls `effect` when the outcome is successful. `Empty` passes `None`.
    pub fn on_success<F>(self, effect: F) -> Self
    where
        F: FnOnce(Option<&T>),
    {
        match &self {
            Outcome::Value(value) => effect(Some(value)),
            Outcome::Empty => effect(None),
            Outcome::Error(_) => {}
        }
        self
    }

    /// Calls `effect` when the outcome is successful, ignoring the payload.
    pub fn on_success_run<F>(self, effect: F) -> Self
    where
        F: FnOnce(),
    {
        if self.is_success() {
            effect();
        }
        self
    }

    /// Calls `effect` with the cause when the outcome is a failure.
    pub fn on_failure<F>(self, effect: F) -> Self
    where
        F: FnOnce(&E),
    {
        if let Outcome::Error(e) = &self {
            effect(e);
        }
        self
    }

    /// Calls `effect` when the outcome is a failure, ignoring the cause.
    pub fn on_failure_run<F>(self, effect: F) -> Self
    where
        F: FnOnce(),
    {
        if self.is_failure() {
            effect();
        }
        self
    }

    /// Returns the payload. `Empty` and `Error` never hand out a default,
    /// they always report a [`StateError`].
    pub fn get(self) -> Result<T, StateError<E>> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Empty => Err(StateError::NoValue),
            Outcome::Error(e) => Err(StateError::Failed(e)),
        }
    }

    /// Captured cause, `None` for both successful dispositions.
    pub fn get_cause(&self) -> Option<&E> {
        match self {
            Outcome::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_cause(self) -> Option<E> {
        match self {
            Outcome::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn or_else(self, default: T) -> T {
        match self {
            Outcome::Value(value) => value,
            _ => default,
        }
    }

    /// Same as [`Outcome::or_else`] but computes the fallback lazily.
    pub fn or_else_with<S>(self, supplier: S) -> T
    where
        S: FnOnce() -> T,
    {
        match self {
            Outcome::Value(value) => value,
            _ => supplier(),
        }
    }

    /// Returns the payload or raises the error built by `supplier`.
    pub fn or_else_throw<X, S>(self, supplier: S) -> Result<T, X>
    where
        S: FnOnce() -> X,
    {
        match self {
            Outcome::Value(value) => Ok(value),
            _ => Err(supplier()),
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Borrows payload and cause without consuming the outcome.
    pub fn as_ref(&self) -> Outcome<&T, &E> {
        match self {
            Outcome::Value(value) => Outcome::Value(value),
            Outcome::Empty => Outcome::Empty,
            Outcome::Error(e) => Outcome::Error(e),
        }
    }
}

impl<T, E> From<Outcome<T, E>> for Option<T> {
    fn from(outcome: Outcome<T, E>) -> Self {
        outcome.into_option()
    }
}
