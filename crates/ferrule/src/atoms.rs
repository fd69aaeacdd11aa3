//! Lazily interned atoms.

/// Declares functions returning atoms, interned on first use.
///
/// ```ignore
/// ferrule::atoms! {
///     oops,
///     destructor_with_env,
///     elixir_error = "Elixir.FineTest.Error",
/// }
/// ```
#[macro_export]
macro_rules! atoms {
    ($($(#[$meta:meta])* $name:ident $(= $text:literal)?),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name() -> $crate::Atom {
                static ATOM: $crate::__private::Lazy<$crate::Atom> = $crate::__private::Lazy::new(|| {
                    $crate::Atom::new($crate::__atom_text!($name $(, $text)?))
                });
                *ATOM
            }
        )*
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __atom_text {
    ($name:ident) => {
        stringify!($name)
    };
    ($name:ident, $text:literal) => {
        $text
    };
}

crate::atoms! {
    ok,
    error,
    nil,
    true_ = "true",
    false_ = "false",
    struct_ = "__struct__",
    exception_ = "__exception__",
    message,
    badarg,
    argument_error = "Elixir.ArgumentError",
    runtime_error = "Elixir.RuntimeError",
}
