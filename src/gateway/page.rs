//! The single game page, served with the player's session embedded as JSON.

use serde::Serialize;

use crate::game::{GameSession, HistoryEntry, MAX_QUESTIONS};

const STATE_PLACEHOLDER: &str = "__GAME_STATE__";

/// What the page script needs to draw the board without a round trip.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot<'a> {
    pub session_id: String,
    pub question_count: u32,
    pub history: &'a [HistoryEntry],
    pub is_completed: bool,
    pub max_questions: u32,
}

impl<'a> From<&'a GameSession> for PageSnapshot<'a> {
    fn from(session: &'a GameSession) -> Self {
        Self {
            session_id: session.id.to_string(),
            question_count: session.question_count,
            history: &session.history,
            is_completed: session.is_completed,
            max_questions: MAX_QUESTIONS,
        }
    }
}

/// Render the page for `session`.
///
/// The snapshot sits inside a `<script>` element, so every `<` is emitted as
/// `\u003c` to keep player text from closing the element.
pub fn render_game_page(session: &GameSession) -> Result<String, serde_json::Error> {
    let state = serde_json::to_string(&PageSnapshot::from(session))?.replace('<', "\\u003c");
    Ok(GAME_PAGE.replace(STATE_PLACEHOLDER, &state))
}

const GAME_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>GuessMaster: 20 Questions</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 42rem; margin: 2rem auto; padding: 0 1rem; color: #1f2933; }
  h1 { margin-bottom: 0.25rem; }
  #counter { color: #52606d; margin-top: 0; }
  #history { list-style: none; padding: 0; }
  #history li { border-left: 3px solid #3e7bfa; margin: 0.75rem 0; padding: 0.25rem 0.75rem; }
  #history .q { font-weight: 600; }
  #history .a { color: #323f4b; }
  form { display: flex; gap: 0.5rem; }
  input[type=text] { flex: 1; padding: 0.5rem; font-size: 1rem; }
  button { padding: 0.5rem 1rem; font-size: 1rem; cursor: pointer; }
  #error { color: #c81e1e; min-height: 1.25rem; }
  #done { display: none; background: #fff3c4; padding: 0.75rem; }
</style>
</head>
<body>
<h1>20 Questions</h1>
<p id="counter"></p>
<p>I'm thinking of something. Ask yes/no questions to figure out what it is.</p>
<ol id="history"></ol>
<p id="done">Game over! Reset to play again.</p>
<form id="ask-form">
  <input id="question" type="text" maxlength="500" placeholder="Is it bigger than a breadbox?" autocomplete="off">
  <button id="ask" type="submit">Ask</button>
</form>
<p id="error"></p>
<button id="reset" type="button">New game</button>

<script id="game-state" type="application/json">__GAME_STATE__</script>
<script>
(function () {
  var state = JSON.parse(document.getElementById("game-state").textContent);
  var historyEl = document.getElementById("history");
  var counterEl = document.getElementById("counter");
  var errorEl = document.getElementById("error");
  var doneEl = document.getElementById("done");
  var input = document.getElementById("question");
  var askButton = document.getElementById("ask");

  function addEntry(question, answer) {
    var li = document.createElement("li");
    var q = document.createElement("div");
    q.className = "q";
    q.textContent = "Q: " + question;
    var a = document.createElement("div");
    a.className = "a";
    a.textContent = "A: " + answer;
    li.appendChild(q);
    li.appendChild(a);
    historyEl.appendChild(li);
  }

  function refresh() {
    counterEl.textContent = "Question " + state.questionCount + " of " + state.maxQuestions;
    doneEl.style.display = state.isCompleted ? "block" : "none";
    input.disabled = state.isCompleted;
    askButton.disabled = state.isCompleted;
  }

  function post(path, body) {
    return fetch(path, {
      method: "POST",
      headers: { "Content-Type": "application/json" },
      credentials: "same-origin",
      body: JSON.stringify(body)
    }).then(function (res) { return res.json(); });
  }

  state.history.forEach(function (entry) { addEntry(entry.question, entry.answer); });
  refresh();

  document.getElementById("ask-form").addEventListener("submit", function (event) {
    event.preventDefault();
    var question = input.value.trim();
    if (!question) { return; }
    errorEl.textContent = "";
    askButton.disabled = true;
    post("/ask", { question: question }).then(function (data) {
      if (!data.success) {
        errorEl.textContent = data.error;
        return;
      }
      addEntry(question, data.response);
      state.questionCount = data.questionCount;
      state.isCompleted = data.isCompleted;
      input.value = "";
    }).catch(function () {
      errorEl.textContent = "Could not reach the server.";
    }).then(function () {
      askButton.disabled = false;
      refresh();
    });
  });

  document.getElementById("reset").addEventListener("click", function () {
    post("/reset", {}).then(function (data) {
      if (!data.success) {
        errorEl.textContent = data.error;
        return;
      }
      historyEl.innerHTML = "";
      errorEl.textContent = "";
      state.questionCount = data.questionCount;
      state.isCompleted = data.isCompleted;
      state.sessionId = data.sessionId;
      refresh();
    });
  });
})();
</script>
</body>
</html>
"##;
