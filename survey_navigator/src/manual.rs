/*!

This is the long-form manual for `survey_navigator` and `odnav`.

## The response tree

An interview is a JSON object with a `responses` object. The navigator reads
the following parts of it:

```text
responses
├── _activePersonId, _activeVisitedPlaceId, _activeTripId
├── accessCode
├── home { geography, address, city, region, country, postalCode }
└── household { size, carNumber, persons }
    └── persons.<uuid> { _uuid, _sequence, age, ageGroup, occupation, ... }
        ├── visitedPlaces.<uuid> { activity, activityCategory, arrivalTime,
        │                          departureTime, nextPlaceCategory,
        │                          geography, shortcut, name }
        └── trips.<uuid> { _originVisitedPlaceUuid,
                           _destinationVisitedPlaceUuid }
            └── segments.<uuid> { mode, modePre }
```

Records are kept in maps by uuid. Their order is given by `_sequence`,
starting at 1. Records without a sequence come last. Any other field is kept
as is, so records written back by the navigator lose nothing.

A value is _blank_ when it is absent, `null`, an empty string, an empty
array or an empty object.

## Paths

Paths are dotted and relative to `responses`:
`household.persons.P.visitedPlaces.V.name`. In update batches, they are
prefixed with `responses.`.

Relative paths start with `../`, once per level to go up. From
`household.persons.P.trips.T.segments.S.modePre`,
`../../../../../visitedPlaces` is `household.persons.P.visitedPlaces`. A
relative path that does not go up, or that goes above the root, does not
resolve.

## Sections

| section               | complete when                                               |
|-----------------------|-------------------------------------------------------------|
| home                  | size, number of cars and home coordinates are known         |
| household members     | home is complete, size matches the persons, basic info      |
| profile               | under 5, not a worker nor a student, or marked complete     |
| trips intro           | under 5, short trip answer, or marked complete              |
| visited places        | under 5, no trips, or 2+ places and none needs answers      |
| trips                 | under 5, no trips, short trip answer, or all trips have modes |
| travel behavior       | under 5, not a worker nor a student, or marked `true`        |

A person whose age is set but cannot be read (for example an `ageGroup` of
`"abc"`) makes the age-dependent predicates fail with an error rather than
silently pass.

In single-person interviews (configured, or without an access code), only
the active person is checked for trips and travel behavior.

## Next visited place

The first place, in sequence order, such that:
1. its activity or activity category is missing, or
2. it has the highest sequence and the respondent did not stay there until
   the next day, or
3. it is not the first and has no arrival time, or
4. it is the last of the list and has no next place category, or
5. it has no location and its activity is neither `workOnTheRoad` nor
   `leisureStroll`.

Home places are located at the household home. Visits to the usual work or
school place are located at the usual place of the person, or of the person
owning the visit when the usual place has no location.

## Repairs

After places are added, removed or reordered, the next place category of
each place is repaired: a place followed by home is `wentBackHome`, a place
followed by anything else is not, and the last place only keeps
`stayedThereUntilTheNextDay`. The first place has no arrival time, and an
overnight last place has no departure time. The active visited place points
to the next place needing answers.

Deleting a place also deletes the place after it when the places on both
sides share a `home`, `workUsual`, `schoolUsual`, `workOnTheRoad` or
`leisureStroll` activity. Before that, places pointing to a deleted place
through `shortcut` are made independent: the first one takes the name and
the location, the others point to it.

Merging a place realigns the trips: trip `n` goes from place `n` to place
`n + 1`, missing trips are created, the segments of the two trips around the
removed place are concatenated and renumbered, and extra trips are removed.

## Configuration (`odnav`)

`odnav` accepts a JSON configuration file. All keys are optional:

```json
{
  "selfResponseMinimumAge": 14,
  "interviewableMinimumAge": 5,
  "singlePersonInterview": false
}
```

 */
