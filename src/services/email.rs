//! Confirmation email composition and delivery.
//!
//! One email per booking, sent best-effort over the configured SMTP relay.
//! A failed send is logged by the caller and never retried; the booking
//! itself is already persisted and stays valid.

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;
use crate::models::Booking;
use crate::services::ticket_code::{self, TicketCodeError};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid recipient address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to compose message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("mail relay error: {0}")]
    Relay(#[from] lettre::transport::smtp::Error),
    #[error("failed to render ticket code: {0}")]
    TicketCode(#[from] TicketCodeError),
}

#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    support_address: String,
}

impl Mailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, MailError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        let from: Mailbox = format!("Cine Booking <{}>", config.from_address).parse()?;

        Ok(Self {
            transport,
            from,
            support_address: config.from_address.clone(),
        })
    }

    /// Send the ticket confirmation for a freshly created booking.
    ///
    /// Relay authentication failures, DNS/network failures and a malformed
    /// recipient address all surface here as `MailError`.
    pub async fn send_confirmation(&self, booking: &Booking) -> Result<(), MailError> {
        let to: Mailbox = booking.email.parse()?;

        let qr_data = ticket_code::encode_ticket(booking);
        let qr_base64 = ticket_code::qr_png_base64(&qr_data)?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(format!(
                "Your Movie Ticket Confirmation - {}",
                booking.movie_name
            ))
            .multipart(MultiPart::alternative_plain_html(
                render_text(booking, &qr_data, &self.support_address),
                render_html(booking, &qr_base64, &qr_data, &self.support_address),
            ))?;

        self.transport.send(email).await?;
        Ok(())
    }
}

fn render_html(booking: &Booking, qr_base64: &str, qr_data: &str, support: &str) -> String {
    format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; background-color: #f4f4f4; margin: 0; padding: 0;">
    <div style="max-width: 600px; margin: 20px auto; background-color: white; padding: 30px; border-radius: 10px;">
      <div style="background: #667eea; color: white; padding: 20px; border-radius: 10px; text-align: center;">
        <h1 style="margin: 0;">Movie Ticket Confirmed!</h1>
        <p>Your booking is confirmed. Keep this email safe.</p>
      </div>
      <h2>Ticket Details</h2>
      <table style="width: 100%; border-collapse: collapse;">
        <tr><td style="padding: 8px 0; font-weight: bold;">Movie Name:</td><td>{movie}</td></tr>
        <tr><td style="padding: 8px 0; font-weight: bold;">Date:</td><td>{date}</td></tr>
        <tr><td style="padding: 8px 0; font-weight: bold;">Show Time:</td><td>{time}</td></tr>
        <tr><td style="padding: 8px 0; font-weight: bold;">Number of Tickets:</td><td>{seats}</td></tr>
        <tr><td style="padding: 8px 0; font-weight: bold;">Price per Ticket:</td><td>&#8377;{price}</td></tr>
        <tr><td style="padding: 8px 0; font-weight: bold;">Total Amount:</td><td>&#8377;{total}</td></tr>
        <tr><td style="padding: 8px 0; font-weight: bold;">Ticket ID:</td><td>#{id}</td></tr>
      </table>
      <p style="background-color: #fff3cd; padding: 15px; border-radius: 4px;">
        <strong>Important:</strong> Please present this QR code at the cinema entrance for ticket validation.
      </p>
      <div style="text-align: center; margin: 30px 0;">
        <h2>Your Ticket QR Code</h2>
        <p>Scan this QR code at the cinema or show it to the ticket counter.</p>
        <img src="data:image/png;base64,{qr_base64}" alt="Ticket QR Code" style="max-width: 250px;">
        <p style="font-size: 12px; color: #666;">{qr_data}</p>
      </div>
      <p style="text-align: center;">Thank you for booking with us!</p>
      <div style="text-align: center; color: #666; font-size: 12px; border-top: 1px solid #eee; padding-top: 20px;">
        <p>This is an automated email. Please do not reply to this email.</p>
        <p>For support, contact us at {support}</p>
      </div>
    </div>
  </body>
</html>"#,
        movie = booking.movie_name,
        date = booking.date.format("%d %B %Y"),
        time = booking.showtime.format("%I:%M %p"),
        seats = booking.seats,
        price = booking.price,
        total = booking.total_price(),
        id = booking.id,
        qr_base64 = qr_base64,
        qr_data = qr_data,
        support = support,
    )
}

fn render_text(booking: &Booking, qr_data: &str, support: &str) -> String {
    format!(
        "MOVIE TICKET CONFIRMATION\n\
         \n\
         Movie: {movie}\n\
         Date: {date}\n\
         Show Time: {time}\n\
         Number of Tickets: {seats}\n\
         Price per Ticket: Rs.{price}\n\
         Total Amount: Rs.{total}\n\
         Ticket ID: #{id}\n\
         \n\
         QR Code Data:\n\
         {qr_data}\n\
         \n\
         Please present the QR code at the cinema entrance for validation.\n\
         \n\
         Thank you for booking with us!\n\
         \n\
         ---\n\
         This is an automated email. Please do not reply.\n\
         For support, contact: {support}\n",
        movie = booking.movie_name,
        date = booking.date.format("%d %B %Y"),
        time = booking.showtime.format("%I:%M %p"),
        seats = booking.seats,
        price = booking.price,
        total = booking.total_price(),
        id = booking.id,
        qr_data = qr_data,
        support = support,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    fn dune() -> Booking {
        Booking {
            id: 7,
            movie_name: "Dune".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            showtime: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            seats: 2,
            price: 250,
            email: "user@example.com".to_string(),
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn text_body_shows_unit_price_times_seats() {
        let body = render_text(&dune(), "qr-data", "support@example.com");
        assert!(body.contains("Price per Ticket: Rs.250"));
        assert!(body.contains("Total Amount: Rs.500"));
        assert!(body.contains("Ticket ID: #7"));
    }

    #[test]
    fn html_body_embeds_qr_image_and_total() {
        let body = render_html(&dune(), "QRBASE64", "qr-data", "support@example.com");
        assert!(body.contains("data:image/png;base64,QRBASE64"));
        assert!(body.contains("&#8377;500"));
        assert!(body.contains("01 May 2025"));
        assert!(body.contains("06:00 PM"));
    }

    #[test]
    fn mailer_rejects_malformed_recipient() {
        let result = "not-an-address".parse::<Mailbox>();
        assert!(result.is_err());
    }
}
