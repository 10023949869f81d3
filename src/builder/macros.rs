//! Macros for fieldless state, action and command enums.

/// Generate a fieldless enum implementing [`State`](crate::core::State).
///
/// Each variant's tag is its name.
///
/// # Example
///
/// ```
/// use switchyard::state_enum;
/// use switchyard::core::State;
///
/// state_enum! {
///     pub enum Day {
///         Home,
///         Work,
///         Bed,
///         Sick,
///     }
///     final: [Bed]
///     error: [Sick]
/// }
///
/// assert_eq!(Day::Work.name(), "Work");
/// assert!(Day::Bed.is_final());
/// assert!(Day::Sick.is_error());
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        $(final: [$($final:ident),* $(,)?])?
        $(error: [$($error:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn is_final(&self) -> bool {
                match self {
                    $($(Self::$final => true,)*)?
                    _ => false,
                }
            }

            fn is_error(&self) -> bool {
                match self {
                    $($(Self::$error => true,)*)?
                    _ => false,
                }
            }
        }
    };
}

/// Generate a fieldless enum implementing [`Action`](crate::core::Action).
///
/// # Example
///
/// ```
/// use switchyard::action_enum;
/// use switchyard::core::Action;
///
/// action_enum! {
///     pub enum Routine {
///         Commute,
///         Sleep,
///     }
/// }
///
/// assert_eq!(Routine::Sleep.name(), "Sleep");
/// ```
#[macro_export]
macro_rules! action_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Debug)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::Action for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }
    };
}

/// Generate a fieldless enum implementing [`Command`](crate::core::Command).
#[macro_export]
macro_rules! command_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Debug)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::Command for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }
    };
}
