//! Prompt text for the reasoning step.

use crate::agent::Step;
use crate::agent::tools::{SQL_TOOLS, tool_names};
use crate::session::HistoryEntry;

/// Stop sequence keeping the model from writing its own observations.
pub const STOP: &[&str] = &["\nObservation"];

/// System instructions sent with every generation.
pub const SYSTEM_PROMPT: &str = "\
You are an assistant that works with a SQLite database on the user's behalf.
You can add rows, read rows, and create tables using the tools provided.
Think before you act and make sure every SQL statement is valid.

When adding data:
1. Write one complete INSERT statement
2. Put single quotes around text values
3. Leave numeric values unquoted

When reading data:
1. Filter with a WHERE clause when the user asks for specific rows
2. Present the rows clearly

Always:
1. Work one step at a time
2. Check the observation before claiming success
3. Finish with a short summary of what was done";

const INSTRUCTIONS: &str = "\
Answer the following questions as best you can. You have access to the following tools:";

const FORMAT: &str = "\
Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the tool to use, one of [{tool_names}]
Action Input: the SQL statement to execute
Observation: the result of the action
Thought: I now know the final answer
Final Answer: a summary of the result

For example:
Question: add Jane Roe, a 41 year old pilot
Thought: I need to insert a new person
Action: add_data
Action Input: INSERT INTO people (name, age, profession) VALUES ('Jane Roe', 41, 'Pilot')
Observation: Statement executed successfully.
Thought: I now know the final answer
Final Answer: Added Jane Roe to people

Question: make a table for books
Thought: I need a new table called book
Action: create_table
Action Input: CREATE TABLE IF NOT EXISTS book (id INTEGER PRIMARY KEY, title TEXT, year INTEGER)
Observation: Statement executed successfully.
Thought: I now know the final answer
Final Answer: book table created

Question: list every book
Thought: I need all rows of the book table
Action: read_data
Action Input: SELECT * FROM book
Observation: | 1 | Dune | 1965 |
Thought: I now know the final answer
Final Answer: One book: Dune (1965)";

/// Appended to the scratchpad when the model must answer without tools.
pub const FINAL_ANSWER_NUDGE: &str =
    "\n\nI now need to return a final answer based on the previous steps:";

/// Render the full ReAct prompt for one generation.
pub fn render(history: &[HistoryEntry], input: &str, steps: &[Step]) -> String {
    let tools = SQL_TOOLS
        .iter()
        .map(|t| format!("{}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "{INSTRUCTIONS}\n\n{tools}\n\n{}\n\n",
        FORMAT.replace("{tool_names}", &tool_names())
    );

    if !history.is_empty() {
        prompt.push_str("Previous conversation:\n");
        for entry in history {
            prompt.push_str(&format!("{}: {}\n", entry.role, entry.content));
        }
        prompt.push('\n');
    }

    prompt.push_str("Begin!\n\n");
    prompt.push_str(&format!("Question: {input}\n"));
    prompt.push_str(&scratchpad(steps));
    prompt
}

/// Earlier steps of this turn, each closed with its observation.
pub fn scratchpad(steps: &[Step]) -> String {
    let mut pad = String::new();
    for step in steps {
        pad.push_str(&step.log);
        pad.push_str(&format!("\nObservation: {}\nThought: ", step.observation));
    }
    pad
}
