//! Prompt construction
//!
//! Each prompt embeds the full document content and asks for a JSON payload
//! in the shape the response parser expects.

/// Prompt for a topic-wise summary: `{summary, topics[{title, content}]}`
pub fn summary_prompt(content: &str) -> String {
    format!(
        r#"Analyze the following text and write a topic-wise study summary.

Instructions:
1. Start with one overall summary paragraph
2. Break the material down into its key topics, each with a detailed explanation
3. Keep it educational and easy to follow
4. Use clear, descriptive topic titles

Respond with JSON in exactly this structure:
{{
  "summary": "Overall summary paragraph",
  "topics": [
    {{
      "title": "Topic title",
      "content": "Explanation of the topic with key points and examples"
    }}
  ]
}}

Text to analyze:
{content}
"#
    )
}

/// Prompt for a flashcard deck: `[{question, answer}]`
pub fn flashcards_prompt(content: &str) -> String {
    format!(
        r#"Create study flashcards from the following content.

Instructions:
1. Choose the number of cards the material needs, between 15 and 25
2. Ask questions that test understanding rather than recall alone
3. Mix definitions, concepts, examples and applications
4. Give clear answers with a short explanation
5. Cover every important topic in the content

Respond with a JSON array:
[
  {{
    "question": "Specific question",
    "answer": "Answer with explanation"
  }}
]

Content:
{content}
"#
    )
}

/// Prompt for a quiz of exactly `count` questions: `[{question, options[4], correctAnswer}]`
pub fn quiz_prompt(content: &str, count: u32) -> String {
    format!(
        r#"Create {count} multiple-choice questions from the following content.

Instructions:
1. Create exactly {count} questions
2. Test understanding, analysis and application
3. Vary the difficulty between easy, medium and hard
4. Give every question exactly 4 plausible options
5. Avoid obviously wrong options
6. Cover different parts of the content

Respond with a JSON array, where "correctAnswer" is the zero-based index of the correct option:
[
  {{
    "question": "Specific question",
    "options": ["option 1", "option 2", "option 3", "option 4"],
    "correctAnswer": 0
  }}
]

Content:
{content}
"#
    )
}
