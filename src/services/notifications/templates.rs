use super::NotificationRequest;
use crate::{models::mail::OutgoingEmail, settings::Notifications};

pub fn render(request: &NotificationRequest, settings: &Notifications) -> OutgoingEmail {
    let team = format!("{} Team", escape(&settings.brand));

    match request {
        NotificationRequest::Welcome { to, otp } => OutgoingEmail {
            to: to.clone(),
            subject: "Account Verification".to_string(),
            html: page(
                &team,
                &[
                    format!("<h2>Welcome to {}</h2>", escape(&settings.brand)),
                    "<p>Please confirm your email to secure your account.</p>".to_string(),
                    format!("<p>Your OTP is: {}</p>", escape(otp)),
                ],
            ),
        },
        NotificationRequest::NewRegistration { first_name, email } => OutgoingEmail {
            to: settings.admin_email.clone(),
            subject: "New User Registration".to_string(),
            html: page(
                &team,
                &[
                    "<p>Hello Chief,</p>".to_string(),
                    format!(
                        "<p>{} with email {} just signed up. Please visit your dashboard for confirmation.</p>",
                        escape(first_name),
                        escape(email)
                    ),
                ],
            ),
        },
        NotificationRequest::PasswordResetOtp { to, otp } => OutgoingEmail {
            to: to.clone(),
            subject: "Password Reset OTP".to_string(),
            html: page(
                &team,
                &[
                    format!("<h2>{} Password Reset</h2>", escape(&settings.brand)),
                    format!("<p>Your OTP is: {}</p>", escape(otp)),
                    "<p>This OTP is valid for a short period. Do not share it with anyone.</p>"
                        .to_string(),
                ],
            ),
        },
        NotificationRequest::ForgotPassword { to } => OutgoingEmail {
            to: to.clone(),
            subject: "Password Reset".to_string(),
            html: page(
                &team,
                &[
                    "<p>Dear User,</p>".to_string(),
                    "<p>Forgot your password? Click the link below to reset it:</p>".to_string(),
                    format!(
                        "<p><a href=\"{}\">Reset Password</a></p>",
                        escape(&settings.reset_password_url)
                    ),
                    "<p>If you did not request this, please ignore this email.</p>".to_string(),
                ],
            ),
        },
        NotificationRequest::AccountDetails { to, name, otp } => OutgoingEmail {
            to: to.clone(),
            subject: "Your Account Details".to_string(),
            html: page(
                &team,
                &[
                    format!("<p>Hello {},</p>", escape(name)),
                    format!("<p>Your account is registered with {}.</p>", escape(to)),
                    format!("<p>Your verification OTP is: {}</p>", escape(otp)),
                ],
            ),
        },
        NotificationRequest::Deposit {
            from,
            amount,
            method,
            timestamp,
        } => OutgoingEmail {
            to: settings.admin_email.clone(),
            subject: "Transaction Notification".to_string(),
            html: page(
                &team,
                &[
                    "<p>Hello Chief,</p>".to_string(),
                    format!(
                        "<p>{} sent ${} worth of {}. Please confirm the transaction and update their balance on your dashboard.</p>",
                        escape(from),
                        escape(amount),
                        escape(method)
                    ),
                    format!("<p>Timestamp: {}</p>", escape(timestamp)),
                ],
            ),
        },
        NotificationRequest::WithdrawalRequest {
            from,
            amount,
            method,
            address,
        } => OutgoingEmail {
            to: settings.admin_email.clone(),
            subject: "Transaction Notification".to_string(),
            html: page(
                &team,
                &[
                    "<p>Hello Chief,</p>".to_string(),
                    format!(
                        "<p>{} wants to withdraw ${} worth of {} into {} wallet address.</p>",
                        escape(from),
                        escape(amount),
                        escape(method),
                        escape(address)
                    ),
                ],
            ),
        },
    }
}

fn page(team: &str, paragraphs: &[String]) -> String {
    format!(
        "<html>{}<p>Best wishes,</p><p>{}</p></html>",
        paragraphs.concat(),
        team
    )
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Notifications {
        Notifications {
            admin_email: "admin@broker.test".to_string(),
            reset_password_url: "https://broker.test/reset".to_string(),
            brand: "Broker".to_string(),
        }
    }

    #[test]
    fn admin_notifications_go_to_the_admin_address() {
        let email = render(
            &NotificationRequest::WithdrawalRequest {
                from: "Ada".to_string(),
                amount: "250".to_string(),
                method: "btc".to_string(),
                address: "bc1q".to_string(),
            },
            &settings(),
        );

        assert_eq!(email.to, "admin@broker.test");
        assert!(email.html.contains("Ada wants to withdraw $250 worth of btc into bc1q"));
        assert!(email.html.contains("Broker Team"));
    }

    #[test]
    fn welcome_email_carries_the_otp() {
        let email = render(
            &NotificationRequest::Welcome {
                to: "a@x.com".to_string(),
                otp: "123456".to_string(),
            },
            &settings(),
        );

        assert_eq!(email.to, "a@x.com");
        assert_eq!(email.subject, "Account Verification");
        assert!(email.html.contains("Your OTP is: 123456"));
    }

    #[test]
    fn user_supplied_values_are_escaped() {
        let email = render(
            &NotificationRequest::NewRegistration {
                first_name: "<script>".to_string(),
                email: "a@x.com".to_string(),
            },
            &settings(),
        );

        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;"));
    }
}
