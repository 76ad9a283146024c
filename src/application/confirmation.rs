use crate::domain::order::Order;

pub const SUBJECT: &str = "Your Order is Paid ✅";

pub struct Confirmation {
    pub subject: &'static str,
    pub html_body: String,
}

/// Render the payment confirmation invoice for `order`.
pub fn render(order: &Order) -> Confirmation {
    let status = if order.paid { "✅ Paid" } else { "Pending" };
    let html_body = format!(
        r#"<h2>🧾 Invoice - Crypto Order Confirmation</h2>
<p>Thank you for your payment!</p>
<table border="1" cellpadding="10">
  <tr><th>Item</th><td>Image Review Service</td></tr>
  <tr><th>Email</th><td>{email}</td></tr>
  <tr><th>File</th><td>{file}</td></tr>
  <tr><th>Status</th><td><strong>{status}</strong></td></tr>
</table>
<br>
<p>We'll be in touch soon with your final results.</p>
<small>This is an automated confirmation. No reply needed.</small>
"#,
        email = escape_html(&order.email),
        file = escape_html(&order.image_ref),
        status = status,
    );
    Confirmation {
        subject: SUBJECT,
        html_body,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
