//! System prompts and fixed reply text for the assistant

/// Base system prompt for assistant replies
pub const ASSISTANT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant that specializes in \
helping users plan events. You have access to the conversation so far. Respond in a concise, \
polite, and helpful way.";

/// Fixed reply substituted when response generation fails
///
/// Persisted and surfaced like any other assistant utterance.
pub const APOLOGY_REPLY: &str =
    "I'm sorry, but I ran into an error. Could you please try again?";

/// System prompt for the LLM entity-extraction strategy
///
/// Requests strict JSON over a closed schema; the `contacts` object is
/// flattened by the parser afterwards.
pub const ENTITY_SYSTEM_PROMPT: &str = r#"You are an expert entity extraction system. Extract entities from the input text related to event planning.
Return a JSON object with the following structure (only include fields if they are present in the text):
{
    "people": [list of people mentioned],
    "organizations": [list of organizations],
    "location": "the event location",
    "date": "the event date",
    "time": "the event time",
    "budget": "the event budget",
    "cost": "the event cost per person or ticket",
    "event_type": "type of event (meeting, party, etc.)",
    "theme": "event theme if mentioned",
    "attendees": "number of attendees",
    "contacts": {
        "email": "contact email if present",
        "phone": "contact phone if present"
    }
}

IMPORTANT: Only extract information that is explicitly mentioned in the text. Do not make assumptions.
IMPORTANT: Return valid JSON only, no additional text.
IMPORTANT: If a list field has only one item, still format it as a list.
"#;
