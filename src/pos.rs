use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use solana_sdk::pubkey::Pubkey;
use tracing::error;
use url::Url;

use crate::config::Config;
use crate::debounce::Debouncer;
use crate::payment::{build_descriptor, uri::encode_url};
use crate::prices::{convert, ConversionRequest, RateSource};
use crate::tokens::TokenCode;

/// Menu close animation length.
const MENU_TRANSITION: Duration = Duration::from_millis(300);

/// Maximum significant digits on the keypad, the decimal point excluded.
const MAX_DIGITS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Closed,
    Open,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Wallet {
    pubkey: Option<Pubkey>,
}

impl Wallet {
    pub fn connect(&mut self, pubkey: Pubkey) {
        self.pubkey = Some(pubkey);
    }

    pub fn disconnect(&mut self) {
        self.pubkey = None;
    }

    pub fn connected(&self) -> bool {
        self.pubkey.is_some()
    }

    pub fn pubkey(&self) -> Option<Pubkey> {
        self.pubkey
    }
}

/// Everything the terminal shows. Mutated from keypad handlers and from the
/// debounced conversion task, so it lives behind a mutex.
#[derive(Debug, Clone)]
pub struct DisplayState {
    pub eur_amount: String,
    pub selected_token: TokenCode,
    pub converted_amount: String,
    pub show_conversion: bool,
    pub menu: MenuState,
    pub qr_modal_open: bool,
    pub qr_code: Option<String>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            eur_amount: String::new(),
            selected_token: TokenCode::Eurc,
            converted_amount: String::new(),
            show_conversion: false,
            menu: MenuState::Closed,
            qr_modal_open: false,
            qr_code: None,
        }
    }
}

pub struct Pos {
    config: Arc<Config>,
    rates: Arc<dyn RateSource>,
    state: Arc<Mutex<DisplayState>>,
    debouncer: Debouncer,
    pub wallet: Wallet,
}

impl Pos {
    pub fn new(config: Arc<Config>, rates: Arc<dyn RateSource>) -> Self {
        let quiet_period = Duration::from_millis(config.quiet_period_ms);
        Self {
            config,
            rates,
            state: Arc::new(Mutex::new(DisplayState::default())),
            debouncer: Debouncer::new(quiet_period),
            wallet: Wallet::default(),
        }
    }

    pub fn display(&self) -> DisplayState {
        self.state.lock().unwrap().clone()
    }

    // ------------------------------------------------------------------
    // Keypad
    // ------------------------------------------------------------------

    pub fn press_key(&mut self, key: &str) {
        {
            let mut state = self.state.lock().unwrap();
            if key == "." && state.eur_amount.contains('.') {
                return;
            }
            if key == "." && state.eur_amount.is_empty() {
                state.eur_amount = "0.".to_string();
            } else {
                let new_value = if state.eur_amount == "0" {
                    key.to_string()
                } else {
                    format!("{}{}", state.eur_amount, key)
                };
                if new_value.replace('.', "").len() <= MAX_DIGITS {
                    state.eur_amount = new_value;
                }
            }
        }
        self.refresh_conversion();
    }

    pub fn clear_input(&mut self) {
        self.state.lock().unwrap().eur_amount.clear();
        self.refresh_conversion();
    }

    pub fn select_token(&mut self, token: TokenCode) {
        self.state.lock().unwrap().selected_token = token;
        self.refresh_conversion();
    }

    // ------------------------------------------------------------------
    // Conversion pipeline
    // ------------------------------------------------------------------

    /// Re-arm the debounced conversion for the current (amount, token).
    /// An empty or non-numeric amount clears the display immediately and
    /// makes no network call; otherwise the previous timer is cancelled and
    /// a fresh one is armed for the quiet period.
    fn refresh_conversion(&mut self) {
        let (eur_amount, token) = {
            let state = self.state.lock().unwrap();
            (state.eur_amount.clone(), state.selected_token)
        };

        if sanitize_amount(&eur_amount).is_none() {
            self.debouncer.cancel();
            let mut state = self.state.lock().unwrap();
            state.converted_amount.clear();
            state.show_conversion = false;
            return;
        }

        let rates = self.rates.clone();
        let state = self.state.clone();
        self.debouncer.schedule(move || async move {
            let request = ConversionRequest {
                eur_amount,
                token,
            };
            match convert(request, rates.as_ref()).await {
                Ok(result) => {
                    let mut state = state.lock().unwrap();
                    state.converted_amount = result.converted_amount;
                    state.show_conversion = true;
                }
                Err(e) => {
                    error!("Failed to fetch conversion rate: {}", e);
                    state.lock().unwrap().show_conversion = false;
                }
            }
        });
    }

    // ------------------------------------------------------------------
    // Menu
    // ------------------------------------------------------------------

    /// Open the menu, or begin the timed close transition if it is open.
    /// The spawned task flips Closing to Closed once the transition ends.
    pub fn toggle_menu(&mut self) {
        let mut state = self.state.lock().unwrap();
        match state.menu {
            MenuState::Closed => state.menu = MenuState::Open,
            MenuState::Open => {
                state.menu = MenuState::Closing;
                drop(state);
                let shared = self.state.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(MENU_TRANSITION).await;
                    let mut state = shared.lock().unwrap();
                    if state.menu == MenuState::Closing {
                        state.menu = MenuState::Closed;
                    }
                });
            }
            MenuState::Closing => {}
        }
    }

    /// Close an open menu and wait out the transition before the caller
    /// runs a modal action; a closed menu returns immediately.
    pub async fn close_menu_if_open(&mut self) {
        let was_open = {
            let mut state = self.state.lock().unwrap();
            if state.menu == MenuState::Open {
                state.menu = MenuState::Closing;
                true
            } else {
                false
            }
        };
        if was_open {
            tokio::time::sleep(MENU_TRANSITION).await;
            let mut state = self.state.lock().unwrap();
            if state.menu == MenuState::Closing {
                state.menu = MenuState::Closed;
            }
        }
    }

    // ------------------------------------------------------------------
    // History and QR
    // ------------------------------------------------------------------

    /// Explorer link for the connected wallet's payment history.
    pub fn history_url(&self) -> Result<String> {
        let pubkey = self
            .wallet
            .pubkey()
            .ok_or_else(|| anyhow!("Please connect your wallet to view transaction history."))?;
        Ok(format!("https://solscan.io/account/{}", pubkey))
    }

    /// Build the Solana Pay URL for the current conversion and render its
    /// QR code, opening the modal on success.
    ///
    /// The recipient is the connected wallet's own key, as the original
    /// terminal behaves.
    pub fn generate_qr(&mut self) -> Result<Url> {
        let pubkey = self
            .wallet
            .pubkey()
            .ok_or_else(|| anyhow!("Please connect your wallet before generating the QR code."))?;

        let (converted_amount, token) = {
            let state = self.state.lock().unwrap();
            if !state.show_conversion {
                bail!("Please enter a valid EUR amount to convert.");
            }
            (state.converted_amount.clone(), state.selected_token)
        };

        let descriptor =
            build_descriptor(&self.config, &pubkey.to_string(), &converted_amount, token)?;
        let url = encode_url(&descriptor)?;

        match qrcode::QrCode::new(url.as_str()) {
            Ok(code) => {
                let rendered = code.render::<qrcode::render::unicode::Dense1x2>().build();
                let mut state = self.state.lock().unwrap();
                state.qr_code = Some(rendered);
                state.qr_modal_open = true;
            }
            Err(e) => error!("Failed to render payment QR code: {}", e),
        }

        Ok(url)
    }

    pub fn close_qr_modal(&mut self) {
        self.state.lock().unwrap().qr_modal_open = false;
    }
}

/// Strip everything but digits and the decimal point; `None` when nothing
/// numeric remains.
fn sanitize_amount(value: &str) -> Option<String> {
    let sanitized: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if sanitized.chars().any(|c| c.is_ascii_digit()) {
        Some(sanitized)
    } else {
        None
    }
}

// ----------------------------------------------------------------------
// Display formatting (Greek locale: '.' groups thousands, ',' decimals)
// ----------------------------------------------------------------------

pub fn format_euro(value: &str) -> String {
    let sanitized = match sanitize_amount(value) {
        Some(s) => s,
        None => return "0,00".to_string(),
    };
    let capped: String = sanitized.chars().take(MAX_DIGITS).collect();

    let (integer, decimal) = match capped.split_once('.') {
        Some((i, d)) => (i, d),
        None => (capped.as_str(), ""),
    };

    let integer = integer.trim_start_matches('0');
    let integer = if integer.is_empty() { "0" } else { integer };
    let decimal = format!("{:0<2}", decimal);

    format!("{},{}", group_thousands(integer), &decimal[..2])
}

pub fn format_crypto(value: &str) -> String {
    let amount = match value.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => return "0,0000".to_string(),
    };

    let fixed = format!("{:.4}", amount);
    let (integer, decimal) = fixed.split_once('.').unwrap_or((fixed.as_str(), "0000"));
    format!("{},{}", group_thousands(integer), decimal)
}

fn group_thousands(integer: &str) -> String {
    let digits: Vec<char> = integer.chars().collect();
    let mut grouped = String::new();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*c);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WALLET: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    struct CountingRate {
        rate: f64,
        calls: AtomicUsize,
    }

    impl CountingRate {
        fn new(rate: f64) -> Self {
            Self {
                rate,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RateSource for CountingRate {
        async fn eur_rate(&self, _token: TokenCode) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rate)
        }
    }

    fn pos_with(rates: Arc<CountingRate>) -> Pos {
        Pos::new(Arc::new(Config::from_env().unwrap()), rates)
    }

    #[test]
    fn test_format_euro_groups_thousands_with_two_decimals() {
        assert_eq!(format_euro(""), "0,00");
        assert_eq!(format_euro("7"), "7,00");
        assert_eq!(format_euro("0.5"), "0,50");
        assert_eq!(format_euro("1234567.8"), "1.234.567,80");
        assert_eq!(format_euro("123456789"), "123.456.789,00");
        assert_eq!(format_euro("xyz"), "0,00");
    }

    #[test]
    fn test_format_euro_property_over_digit_strings() {
        let samples = [
            "1", "12", "123", "1234", "12345", "123456", "1234567", "12345678", "123456789",
            "1.5", "12.34", "123.456", "999999.99",
        ];
        for s in samples {
            let formatted = format_euro(s);
            let (int_part, dec_part) = formatted.split_once(',').unwrap();
            assert_eq!(dec_part.len(), 2, "{} -> {}", s, formatted);
            for group in int_part.split('.').skip(1) {
                assert_eq!(group.len(), 3, "{} -> {}", s, formatted);
            }
        }
    }

    #[test]
    fn test_format_crypto() {
        assert_eq!(format_crypto(""), "0,0000");
        assert_eq!(format_crypto("92.5926"), "92,5926");
        assert_eq!(format_crypto("12.5"), "12,5000");
        assert_eq!(format_crypto("1234.5678"), "1.234,5678");
    }

    #[tokio::test(start_paused = true)]
    async fn test_keypad_rules() {
        let mut pos = pos_with(Arc::new(CountingRate::new(1.0)));

        pos.press_key(".");
        assert_eq!(pos.display().eur_amount, "0.");
        pos.press_key(".");
        assert_eq!(pos.display().eur_amount, "0.");
        pos.press_key("5");
        assert_eq!(pos.display().eur_amount, "0.5");

        pos.clear_input();
        pos.press_key("0");
        pos.press_key("7");
        assert_eq!(pos.display().eur_amount, "7");

        pos.clear_input();
        for _ in 0..12 {
            pos.press_key("9");
        }
        assert_eq!(pos.display().eur_amount, "9".repeat(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_keystrokes_issues_one_query_with_final_value() {
        let rates = Arc::new(CountingRate::new(1.08));
        let mut pos = pos_with(rates.clone());

        pos.press_key("1");
        pos.press_key("0");
        pos.press_key("0");

        tokio::time::sleep(Duration::from_millis(900)).await;

        assert_eq!(rates.calls.load(Ordering::SeqCst), 1);
        let display = pos.display();
        assert!(display.show_conversion);
        assert_eq!(display.converted_amount, "92.5926");
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_switch_restarts_timer_and_queries_once() {
        let rates = Arc::new(CountingRate::new(2.0));
        let mut pos = pos_with(rates.clone());

        pos.press_key("5");
        tokio::time::sleep(Duration::from_millis(400)).await;
        pos.select_token(TokenCode::Sol);
        tokio::time::sleep(Duration::from_millis(900)).await;

        assert_eq!(rates.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pos.display().converted_amount, "2.5000");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_input_suppresses_conversion_without_a_query() {
        let rates = Arc::new(CountingRate::new(1.0));
        let mut pos = pos_with(rates.clone());

        pos.press_key("4");
        pos.clear_input();
        tokio::time::sleep(Duration::from_millis(2000)).await;

        assert_eq!(rates.calls.load(Ordering::SeqCst), 0);
        let display = pos.display();
        assert!(!display.show_conversion);
        assert!(display.converted_amount.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_suppresses_display() {
        struct FailingRate;

        #[async_trait]
        impl RateSource for FailingRate {
            async fn eur_rate(&self, _token: TokenCode) -> Result<f64> {
                bail!("connection refused")
            }
        }

        let mut pos = Pos::new(
            Arc::new(Config::from_env().unwrap()),
            Arc::new(FailingRate),
        );
        pos.press_key("9");
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(!pos.display().show_conversion);
    }

    #[tokio::test(start_paused = true)]
    async fn test_menu_transition() {
        let mut pos = pos_with(Arc::new(CountingRate::new(1.0)));
        assert_eq!(pos.display().menu, MenuState::Closed);

        pos.toggle_menu();
        assert_eq!(pos.display().menu, MenuState::Open);

        pos.toggle_menu();
        assert_eq!(pos.display().menu, MenuState::Closing);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(pos.display().menu, MenuState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_menu_if_open_waits_out_transition() {
        let mut pos = pos_with(Arc::new(CountingRate::new(1.0)));
        pos.toggle_menu();
        pos.close_menu_if_open().await;
        assert_eq!(pos.display().menu, MenuState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_requires_wallet() {
        let mut pos = pos_with(Arc::new(CountingRate::new(1.0)));
        assert!(pos.history_url().is_err());

        pos.wallet.connect(Pubkey::from_str(WALLET).unwrap());
        assert_eq!(
            pos.history_url().unwrap(),
            format!("https://solscan.io/account/{}", WALLET)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_qr_requires_wallet_and_conversion() {
        let mut pos = pos_with(Arc::new(CountingRate::new(1.08)));
        assert!(pos.generate_qr().is_err());

        pos.wallet.connect(Pubkey::from_str(WALLET).unwrap());
        assert!(pos.generate_qr().is_err());

        pos.press_key("1");
        pos.press_key("0");
        pos.press_key("0");
        tokio::time::sleep(Duration::from_millis(900)).await;

        let url = pos.generate_qr().unwrap();
        assert!(url.as_str().starts_with(&format!("solana:{}", WALLET)));

        let display = pos.display();
        assert!(display.qr_modal_open);
        assert!(display.qr_code.is_some());

        pos.close_qr_modal();
        assert!(!pos.display().qr_modal_open);
    }
}
