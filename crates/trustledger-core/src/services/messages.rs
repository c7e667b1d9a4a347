//! Reply text builders. Every user-visible string the bot sends lives here so
//! the dispatcher stays about state, not copywriting.

use crate::database::TrackableItem;

pub fn onboarding_welcome() -> String {
    "👋 Welcome to TrustLedger!\n\n\
     I'm your personal bot to help you track your daily and shared expenses.\n\n\
     Here's how it works:\n\
     1️⃣ Add items you want to track (e.g., \"add item: Coffee\").\n\
     2️⃣ Log expenses using simple messages (e.g., \"spent 150 on lunch\").\n\
     3️⃣ Share expenses with friends (e.g., \"shared a 300 taxi with Kamal\").\n\n\
     By continuing, you accept our Terms & Conditions. Let's get started!\n\
     💥 Send yes to begin!"
        .to_string()
}

pub fn onboarding_success() -> String {
    "✅ Great! Your account is now active.\n\n\
     You can start by adding an item to track, like this:\n\
     *add item: Groceries*\n\n\
     Or log your first expense:\n\
     *spent 500 on Groceries*"
        .to_string()
}

pub fn onboarding_reminder() -> String {
    "Just send *yes* when you're ready to get started! 💥".to_string()
}

pub fn greeting() -> String {
    "Hello! 👋 How can I help you with your expenses today?".to_string()
}

pub fn farewell() -> String {
    "Goodbye! 👋 Message me anytime you want to log an expense.".to_string()
}

pub fn fallback_unclear() -> String {
    "Sorry, I didn't quite understand that. 🤔 Try something like:\n\
     *spent 500 on groceries*"
        .to_string()
}

pub fn not_sure() -> String {
    "I'm not sure how to handle that yet. 🙈".to_string()
}

pub fn ask_item_name() -> String {
    "Sure! What item would you like to track?".to_string()
}

pub fn item_name_too_long() -> String {
    "That name is a bit long. 😅 Please send a shorter one (100 characters max).".to_string()
}

pub fn item_added(item_name: &str) -> String {
    format!("✅ Got it! \"{}\" is now on your list of trackable items.", item_name)
}

pub fn format_items_list(items: &[TrackableItem]) -> String {
    if items.is_empty() {
        return "You haven't added any items to track yet. Try starting with:\n*add item*"
            .to_string();
    }

    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(index, item)| format!("{}. {}", index + 1, item.item_name))
        .collect();

    format!("Here are your current trackable items:\n\n{}", lines.join("\n"))
}

pub fn personal_expense_missing_fields() -> String {
    "I need both an amount and an item to log that. Try:\n\
     *spent 500 on groceries*"
        .to_string()
}

pub fn personal_expense_logged(item: &str, amount: f64) -> String {
    format!("✅ Logged {} for \"{}\".", amount, item)
}

pub fn ask_expense_amount(item: Option<&str>, persons: &[String]) -> String {
    let mut known = String::new();
    if let Some(item) = item {
        known.push_str(&format!(" for \"{}\"", item));
    }
    if !persons.is_empty() {
        known.push_str(&format!(" with {}", persons.join(", ")));
    }
    format!("How much was the shared expense{}?", known)
}

pub fn ask_expense_item(amount: f64) -> String {
    format!("What was the {} shared expense for?", amount)
}

pub fn ask_expense_persons(item: &str, amount: f64) -> String {
    format!("Who did you share the {} \"{}\" expense with?", amount, item)
}

pub fn invalid_amount() -> String {
    "That amount doesn't look right. 🤔 Please send a number, e.g. *500*.".to_string()
}

pub fn shared_expense_logged(item: &str, amount: f64, persons: &[String]) -> String {
    format!(
        "✅ Logged a shared expense of {} for \"{}\" with {}.",
        amount,
        item,
        persons.join(", ")
    )
}

pub fn ask_balance_person() -> String {
    "Whose balance would you like to check?".to_string()
}

pub fn balance_reply(person: &str, total: f64) -> String {
    format!("{} owes you {} in total from shared expenses.", person, total)
}
