#![cfg(not(tarpaulin_include))]

//! Payment gate and the two pages served at `/`.

use crate::config::{AppConfig, PaywallSettings};
use handlebars::Handlebars;
use log::warn;
use serde_json::json;

const PAYWALL_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>SheetGenius</title></head>
<body>
  <h1>SheetGenius</h1>
  <p>Upload a spreadsheet, get a summary, a scatter plot and clusters by email.</p>

  <h2>{{single_item}}: ${{single_price}}</h2>
  <form action="{{checkout_url}}" method="post">
    <input type="hidden" name="cmd" value="_xclick">
    <input type="hidden" name="business" value="{{business_email}}">
    <input type="hidden" name="item_name" value="{{single_item}}">
    <input type="hidden" name="amount" value="{{single_price}}">
    <input type="hidden" name="currency_code" value="{{currency}}">
    <input type="hidden" name="return" value="{{return_url}}">
    <input type="hidden" name="cancel_return" value="{{cancel_url}}">
    <button type="submit">Pay once</button>
  </form>

  <h2>{{subscription_item}}: ${{subscription_price}} / month</h2>
  <form action="{{checkout_url}}" method="post">
    <input type="hidden" name="cmd" value="_xclick-subscriptions">
    <input type="hidden" name="business" value="{{business_email}}">
    <input type="hidden" name="item_name" value="{{subscription_item}}">
    <input type="hidden" name="a3" value="{{subscription_price}}">
    <input type="hidden" name="p3" value="1">
    <input type="hidden" name="t3" value="M">
    <input type="hidden" name="src" value="1">
    <input type="hidden" name="sra" value="1">
    <input type="hidden" name="currency_code" value="{{currency}}">
    <input type="hidden" name="return" value="{{return_url}}">
    <input type="hidden" name="cancel_return" value="{{cancel_url}}">
    <button type="submit">Subscribe</button>
  </form>
</body>
</html>
"#;

const UPLOAD_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>SheetGenius: upload</title></head>
<body>
  <h1>Upload your spreadsheet</h1>
  <p>Accepted: {{allowed}}. Max {{max_mb}} MB. Macro-enabled workbooks are refused.</p>
  <form action="/api/process?paid=1" method="post" enctype="multipart/form-data">
    <input type="file" name="file" required>
    <input type="email" name="email" placeholder="you@example.com" required>
    <button type="submit">Generate report</button>
  </form>
</body>
</html>
"#;

/// Decides from the processor's redirect flag whether the upload form is shown
///
/// The flag arrives as a query parameter and is not verified against the
/// payment processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentGate;

impl PaymentGate {
    /// Build the gate and log that the paid flag is taken on trust
    pub fn new() -> Self {
        warn!("payment gate trusts the client-supplied ?paid=1 flag; payments are not verified");
        PaymentGate
    }

    /// `paid=1` unlocks; an absent flag, `0`, or anything else does not
    ///
    /// # Examples
    /// ```
    /// use sheetgenius::paywall::PaymentGate;
    ///
    /// let gate = PaymentGate::default();
    /// assert!(gate.is_unlocked(Some("1")));
    /// assert!(!gate.is_unlocked(Some("0")));
    /// assert!(!gate.is_unlocked(None));
    /// ```
    pub fn is_unlocked(&self, paid: Option<&str>) -> bool {
        matches!(paid.map(str::trim), Some("1"))
    }
}

/// Registered page templates
pub struct Pages {
    handlebars: Handlebars<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, handlebars::TemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_template_string("paywall", PAYWALL_TEMPLATE)?;
        handlebars.register_template_string("upload", UPLOAD_TEMPLATE)?;
        Ok(Pages { handlebars })
    }

    pub fn paywall(&self, settings: &PaywallSettings) -> Result<String, handlebars::RenderError> {
        let data = json!({
            "checkout_url": settings.checkout_url,
            "business_email": settings.business_email,
            "currency": settings.currency,
            "single_item": settings.single_item,
            "single_price": settings.single_price,
            "subscription_item": settings.subscription_item,
            "subscription_price": settings.subscription_price,
            "return_url": format!("{}/?paid=1", settings.app_url),
            "cancel_url": format!("{}/?paid=0", settings.app_url),
        });
        self.handlebars.render("paywall", &data)
    }

    pub fn upload(&self, config: &AppConfig) -> Result<String, handlebars::RenderError> {
        let data = json!({
            "allowed": crate::config::ALLOWED_EXTENSIONS.join(", "),
            "max_mb": config.limits.max_upload_mb(),
        });
        self.handlebars.render("upload", &data)
    }
}
