//! Sign-in / sign-up page controller.

use super::{Notification, Route};
use crate::app::AppContext;
use crate::identity::ProviderUser;
use crate::service::identity_service::AuthResult;
use crate::validation::rules::{is_valid_display_name, is_valid_email, is_valid_password};
use log::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthTab {
    #[default]
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Page state of the authentication screen.
///
/// Form failures are shown inline on the active form; popup and
/// password-reset outcomes are returned as notifications.
pub struct AuthController<'a> {
    ctx: &'a AppContext,
    tab: AuthTab,
    sign_in_error: Option<String>,
    sign_up_error: Option<String>,
    redirect: Option<Route>,
}

impl<'a> AuthController<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self {
            ctx,
            tab: AuthTab::SignIn,
            sign_in_error: None,
            sign_up_error: None,
            redirect: None,
        }
    }

    pub fn tab(&self) -> AuthTab {
        self.tab
    }

    /// Inline error currently shown on the given form.
    pub fn error(&self, tab: AuthTab) -> Option<&str> {
        match tab {
            AuthTab::SignIn => self.sign_in_error.as_deref(),
            AuthTab::SignUp => self.sign_up_error.as_deref(),
        }
    }

    pub fn redirect(&self) -> Option<Route> {
        self.redirect
    }

    pub fn switch_tab(&mut self, tab: AuthTab) {
        self.tab = tab;
        self.clear_errors();
    }

    /// Already signed-in visitors go straight to the dashboard.
    pub fn on_auth_state(&mut self, user: Option<&ProviderUser>) {
        if user.is_some() {
            self.redirect = Some(Route::Dashboard);
        }
    }

    pub fn submit_sign_in(&mut self, form: &SignInForm) -> Option<Notification> {
        let email = form.email.trim();
        if !is_valid_email(email) {
            return self.fail(AuthTab::SignIn, "Please enter a valid email address");
        }
        if !is_valid_password(&form.password) {
            return self.fail(AuthTab::SignIn, "Password must be at least 6 characters");
        }
        self.clear_errors();

        match self.ctx.identity().sign_in(email, &form.password) {
            Ok(user) => {
                self.on_auth_state(Some(&user));
                Some(Notification::success("Signed in successfully!"))
            }
            Err(err) => self.fail(AuthTab::SignIn, &err.to_string()),
        }
    }

    pub fn submit_sign_up(&mut self, form: &SignUpForm) -> Option<Notification> {
        let name = form.name.trim();
        let email = form.email.trim();
        if !is_valid_display_name(name) {
            return self.fail(AuthTab::SignUp, "Name must be 2-50 characters");
        }
        if !is_valid_email(email) {
            return self.fail(AuthTab::SignUp, "Please enter a valid email address");
        }
        if !is_valid_password(&form.password) {
            return self.fail(AuthTab::SignUp, "Password must be at least 6 characters");
        }
        if form.password != form.confirm_password {
            return self.fail(AuthTab::SignUp, "Passwords do not match");
        }
        self.clear_errors();

        match self.ctx.identity().sign_up(email, &form.password, name) {
            Ok(user) => {
                self.on_auth_state(Some(&user));
                Some(Notification::success("Account created successfully!"))
            }
            Err(err) => self.fail(AuthTab::SignUp, &err.to_string()),
        }
    }

    pub fn sign_in_with_google(&mut self) -> Notification {
        let result = self.ctx.identity().sign_in_with_google();
        self.finish_popup(result)
    }

    pub fn sign_in_with_github(&mut self) -> Notification {
        let result = self.ctx.identity().sign_in_with_github();
        self.finish_popup(result)
    }

    fn finish_popup(&mut self, result: AuthResult<ProviderUser>) -> Notification {
        match result {
            Ok(user) => {
                self.on_auth_state(Some(&user));
                Notification::success(format!(
                    "Signed in with {} successfully!",
                    user.provider.label()
                ))
            }
            Err(err) => Notification::error(err.to_string()),
        }
    }

    /// Sends a reset link. A blank prompt answer is a no-op.
    pub fn forgot_password(&mut self, email: &str) -> Option<Notification> {
        let email = email.trim();
        if email.is_empty() {
            return None;
        }
        if !is_valid_email(email) {
            return Some(Notification::error("Please enter a valid email address"));
        }
        Some(match self.ctx.identity().send_password_reset(email) {
            Ok(()) => Notification::success("Password reset email sent! Check your inbox."),
            Err(err) => Notification::error(err.to_string()),
        })
    }

    fn fail(&mut self, tab: AuthTab, message: &str) -> Option<Notification> {
        debug!(
            "event=auth_form_error module=auth_controller status=error form={:?}",
            tab
        );
        let slot = match tab {
            AuthTab::SignIn => &mut self.sign_in_error,
            AuthTab::SignUp => &mut self.sign_up_error,
        };
        *slot = Some(message.to_string());
        None
    }

    fn clear_errors(&mut self) {
        self.sign_in_error = None;
        self.sign_up_error = None;
    }
}
