//! Macros to reduce boilerplate in the API layer.

/// Implement `FromRef<AppState>` for a cloneable field so handlers can
/// extract it directly with `State<T>`.
///
/// # Example
/// ```ignore
/// impl_from_ref!(ApiStore, store);
///
/// // Expands to:
/// impl axum::extract::FromRef<AppState> for ApiStore {
///     fn from_ref(state: &AppState) -> Self {
///         state.store.clone()
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
