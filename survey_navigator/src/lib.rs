/*!
Navigation engine for household travel-survey interviews.

An interview is a nested response tree: a household holds persons, a person
holds the places visited during the survey day and the trips between them,
and a trip holds its segments. This crate works on a snapshot of that tree
and tells the questionnaire:

- what is still missing, section by section ([`completion`]),
- which visited place or trip should be presented next,
- which updates keep the tree consistent after a place is added, removed or
  merged ([`consistency`]).

The engine never writes to the tree. Every change is returned as an
[`UpdateBatch`] for the host to commit, and removals are split in a
[`consistency::RemovalPlan`] computed before the removal and a repair computed
from the snapshot after it.

```
use serde_json::json;
use survey_navigator::{completion, Interview, SurveyConfig};

let interview = Interview::from_responses(json!({
    "_activePersonId": "p1",
    "household": {"size": 1, "persons": {"p1": {"_sequence": 1, "age": 3}}},
}))
.unwrap();
let report = completion::evaluate(&interview, &SurveyConfig::DEFAULT_CONFIG).unwrap();
assert!(report.persons[0].trips);
```

See the [`manual`] for the rules applied by each section.
*/

mod config;

pub mod age;
pub mod completion;
pub mod consistency;
pub mod display;
pub mod geography;
pub mod grouped;
pub mod household;
pub mod interview;
pub mod manual;
pub mod path;
pub mod records;
pub mod segments;
pub mod validation;

pub use crate::config::*;
pub use crate::geography::GeoPrimitives;
pub use crate::interview::Interview;
pub use crate::path::{ResponsePath, UpdateBatch};
pub use crate::records::{
    CompletedSections, Home, Household, IsBlank, Person, Responses, Segment, Sequenced, Trip,
    UsualPlace, VisitedPlace,
};
