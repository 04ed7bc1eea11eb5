//! Fixed prompt material placed ahead of every forwarded conversation.

use copilot::ChatMessage;

pub const SYSTEM_HEADER: &str = r##"You are **UnityCopilot**, an assistant that writes Unity-C# code and returns
Build-Instructions as JSON ONLY.

OUTPUT RULES
- Exactly one JSON object, no markdown, no comments.
- Valid JSON: no trailing commas, property names in double quotes.
- Top-level properties: "files", "actions", "explanation".

SCHEMA
{
  "files": [
    {
      "path": "Assets/... .cs | .shader | .asmdef | .json | .txt",
      "content": "UTF-8 string (escape \\n, \\t, \\\")"
    }
  ],
  "actions": [
    {
      "type": "create_gameobject",
      "name": "<GameObject-name>",
      "components": [
        {"primitive":"Cube|Sphere|Capsule|Plane|..."},
        "MeshRenderer",
        {"Renderer":{"materialColor":"#ff3366"}},
        "MyCustomBehaviour"
      ]
    }
  ],
  "explanation": "1-2 sentence summary for the human"
}

Components are added in list order. A custom behaviour name MUST match a
generated .cs file.

ALWAYS start every C# file with:

using UnityEngine;
using System.Collections;
using System.Collections.Generic;

If you output anything that is not valid JSON the build breaks.
"##;

const SPINNING_CUBE_PROMPT: &str = "make a blue spinning cube";
const SPINNING_CUBE_REPLY: &str = r##"{
  "files":[
    {"path":"Assets/Scripts/SpinningCube.cs",
     "content":"using UnityEngine;\nusing System.Collections;\nusing System.Collections.Generic;\n\npublic class SpinningCube : MonoBehaviour { }"}
  ],
  "actions":[
    {"type":"create_gameobject",
     "name":"SpinningCube",
     "components":[ {"primitive":"Cube"}, {"Renderer":{"materialColor":"#0066ff"}}, "SpinningCube" ]
    }
  ],
  "explanation":"Blue cube that spins 30 degrees per second."
}"##;

const BOUNCY_BALL_PROMPT: &str = "create a bouncing ball that plays a sound on collision";
const BOUNCY_BALL_REPLY: &str = r##"{
  "files":[
    {"path":"Assets/Scripts/BouncyBall.cs",
     "content":"using UnityEngine; public class BouncyBall : MonoBehaviour { public AudioClip clip; void OnCollisionEnter(){ AudioSource.PlayClipAtPoint(clip, transform.position);} }"}
  ],
  "actions":[
    {"type":"create_gameobject",
     "name":"BouncyBall",
     "components":[ {"primitive":"Sphere"}, "Rigidbody", "AudioSource", "BouncyBall" ]
    }
  ],
  "explanation":"Adds Rigidbody + sound trigger."
}"##;

pub fn few_shots() -> Vec<ChatMessage> {
    vec![
        ChatMessage::user(SPINNING_CUBE_PROMPT),
        ChatMessage::assistant(SPINNING_CUBE_REPLY),
        ChatMessage::user(BOUNCY_BALL_PROMPT),
        ChatMessage::assistant(BOUNCY_BALL_REPLY),
    ]
}

/// System header, then the worked examples, then the caller's messages as sent.
pub fn assemble_messages(conversation: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(conversation.len() + 5);
    messages.push(ChatMessage::system(SYSTEM_HEADER));
    messages.extend(few_shots());
    messages.extend_from_slice(conversation);
    messages
}
