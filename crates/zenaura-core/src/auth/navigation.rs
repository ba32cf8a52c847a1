/// Side effect requested by logout: take the user back to the login surface.
///
/// Implementations must not fail. A front end without a notion of "login
/// surface" uses `NoopNavigator`.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn redirect_to_login(&self) {}
}
