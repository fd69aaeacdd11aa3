/// Declares an enum whose every variant wraps one codec type.
///
/// Encoding emits the held value. Decoding tries the variants in declaration
/// order and keeps the first that succeeds, so narrower types go first.
///
/// ```ignore
/// ferrule::variant! {
///     #[derive(Debug, PartialEq)]
///     pub enum IntOrString {
///         Int(i64),
///         Text(String),
///     }
/// }
/// ```
#[macro_export]
macro_rules! variant {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident($ty:ty) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $( $(#[$vmeta])* $variant($ty) ),+
        }

        impl $crate::Encoder for $name {
            fn encode(&self, env: &$crate::Env) -> $crate::Term {
                match self {
                    $( $name::$variant(value) => $crate::Encoder::encode(value, env), )+
                }
            }
        }

        impl $crate::Decoder for $name {
            fn decode(
                env: &$crate::Env,
                term: &$crate::Term,
            ) -> ::std::result::Result<Self, $crate::DecodeError> {
                $(
                    if let ::std::result::Result::Ok(value) =
                        <$ty as $crate::Decoder>::decode(env, term)
                    {
                        return ::std::result::Result::Ok($name::$variant(value));
                    }
                )+
                ::std::result::Result::Err($crate::DecodeError::NoVariant {
                    type_name: stringify!($name),
                    found: term.to_string(),
                })
            }
        }
    };
}
