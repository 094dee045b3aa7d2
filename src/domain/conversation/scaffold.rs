//! Known backend prompt strings.
//!
//! The generation backend injects these turns into every transcript to steer
//! the dialogue. They are matched as data by [`MessageFilter`] and never shown
//! to the user.
//!
//! [`MessageFilter`]: super::MessageFilter

/// Number of hidden setup turns at the head of every raw backend transcript.
///
/// Assumed fixed by the backend contract: one setup instruction and its
/// acknowledgement.
pub const HIDDEN_SETUP_TURNS: usize = 2;

/// Prompt sent with `finish=true` to ask for the final generation brief.
pub const FINALIZE_PROMPT: &str =
    "The conversation is complete. Write the final generation brief now, using everything we discussed.";

/// Backend prompt strings recognized as scaffolding.
pub const SCAFFOLD_PROMPTS: &[&str] = &[
    FINALIZE_PROMPT,
    "Write the final generation brief now",
    "Here is the product image and the product details for this ad",
    "Use the reference image as the main visual anchor",
    "Ask me one question at a time about the ad I want to create",
    "Suggest three creative directions for this product",
    "Apply the requested changes to the current image",
    "Continue from where we left off",
];
